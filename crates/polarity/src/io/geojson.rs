use std::path::Path;

use geojson::{feature::Id, Feature, FeatureCollection, Geometry, JsonObject, Value};
use serde::Serialize;

use crate::{
    error::Result,
    io::records::ImageReport,
    pipeline::ImageAnalysis,
};

impl ImageAnalysis {
    /// Export as a feature collection in pixel coordinates: one polygon for
    /// the convex hull (when there is one) and one centroid point per cell.
    pub fn to_geojson(&self, image_name: &str) -> Result<FeatureCollection> {
        let report = ImageReport::new(image_name, self);
        let mut features = Vec::with_capacity(self.cells.len() + 1);

        if let (Some(summary), Some(record)) = (&self.hull, &report.hull) {
            let ring = summary
                .hull_vertices
                .iter()
                .map(|&[x, y]| vec![x, y])
                .collect();
            let mut properties = to_properties(record)?;
            properties.insert("kind".to_string(), "convex_hull".into());
            features.push(Feature {
                bbox: None,
                geometry: Some(Geometry::new(Value::Polygon(vec![ring]))),
                id: Some(Id::String("hull".to_string())),
                properties: Some(properties),
                foreign_members: None,
            });
        }

        for (detected, record) in self.cells.iter().zip(&report.cells) {
            let [x, y] = detected.cell.region.centroid();
            let mut properties = to_properties(record)?;
            properties.insert("kind".to_string(), "cell".into());
            properties.insert("eccentricity".to_string(), detected.cell.eccentricity.into());
            features.push(Feature {
                bbox: None,
                geometry: Some(Geometry::new(Value::Point(vec![x, y]))),
                id: Some(Id::Number(detected.id.into())),
                properties: Some(properties),
                foreign_members: None,
            });
        }

        let (width, height) = self.labels.dimensions();
        let mut foreign_members = JsonObject::new();
        foreign_members.insert("image_name".to_string(), image_name.into());
        foreign_members.insert("image_width".to_string(), width.into());
        foreign_members.insert("image_height".to_string(), height.into());
        foreign_members.insert("cell_count".to_string(), self.cells.len().into());

        Ok(FeatureCollection {
            bbox: None,
            features,
            foreign_members: Some(foreign_members),
        })
    }

    /// Export to GeoJSON and serialize to JSON string
    pub fn to_geojson_string(&self, image_name: &str) -> Result<String> {
        let geojson = self.to_geojson(image_name)?;
        Ok(serde_json::to_string_pretty(&geojson)?)
    }

    /// Save GeoJSON to file
    pub fn save_geojson<P: AsRef<Path>>(&self, image_name: &str, path: P) -> Result<()> {
        let geojson_string = self.to_geojson_string(image_name)?;
        std::fs::write(path, geojson_string)?;
        Ok(())
    }
}

fn to_properties<T: Serialize>(record: &T) -> Result<JsonObject> {
    match serde_json::to_value(record)? {
        serde_json::Value::Object(map) => Ok(map),
        _ => Ok(JsonObject::new()),
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        config::{AcceptanceParams, AnalysisConfig},
        loader::{load_grayscale, SourceImage},
        pipeline::Pipeline,
        types::FloatImage,
    };
    use geojson::{FeatureCollection, Value};
    use image::Luma;

    fn analysis() -> crate::pipeline::ImageAnalysis {
        let buffer = FloatImage::from_fn(120, 80, |x, y| {
            let left = (15..35).contains(&x) && (20..60).contains(&y);
            let right = (80..100).contains(&x) && (20..40).contains(&y);
            Luma([if left || right { 1.0 } else { 0.0 }])
        });
        let image = load_grayscale(&SourceImage::SingleChannel(buffer)).expect("Should load");
        let config = AnalysisConfig {
            area_thresholds: vec![50],
            acceptance: AcceptanceParams {
                min_area: None,
                eccentricity_threshold: 0.0,
            },
            ..AnalysisConfig::default()
        };
        Pipeline::from_config(config)
            .expect("Should build")
            .classify_cells(&image)
            .expect("Should analyse")
    }

    #[test]
    fn export_has_hull_and_one_point_per_cell() {
        let analysis = analysis();
        let collection = analysis.to_geojson("plate_1").expect("Should export");

        assert_eq!(collection.features.len(), analysis.cells.len() + 1);
        let hull = &collection.features[0];
        assert!(matches!(
            hull.geometry.as_ref().map(|g| &g.value),
            Some(Value::Polygon(_))
        ));
        assert_eq!(hull.property("kind").and_then(|v| v.as_str()), Some("convex_hull"));

        let points = collection.features[1..]
            .iter()
            .filter(|f| matches!(f.geometry.as_ref().map(|g| &g.value), Some(Value::Point(_))))
            .count();
        assert_eq!(points, 2);
        let foreign = collection.foreign_members.as_ref().expect("Should carry metadata");
        assert_eq!(foreign.get("image_width").and_then(|v| v.as_u64()), Some(120));
    }

    #[test]
    fn exported_string_parses_back() {
        let analysis = analysis();
        let text = analysis.to_geojson_string("plate_1").expect("Should export");
        let parsed: FeatureCollection = text.parse().expect("Should parse");
        let cell = &parsed.features[1];
        assert!(cell.property("phenotype").and_then(|v| v.as_str()).is_some());
        assert_eq!(cell.property("image_name").and_then(|v| v.as_str()), Some("plate_1"));
    }
}
