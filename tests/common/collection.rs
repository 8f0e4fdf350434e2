use derive_new::new;
use serde_json::{Value, json};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

static IMPORTS: AtomicUsize = AtomicUsize::new(0);

#[derive(Debug, Clone, new)]
pub struct RoadSpec {
    #[new(into)]
    pub id: String,
    #[new(into)]
    pub name: String,
    pub lanes: i64,
}

pub fn roads_type() -> Value {
    json!({
        "name": "roads",
        "descriptors": [
            { "name": "name", "value_type": "Text", "nillable": true, "crs": null },
            { "name": "lanes", "value_type": "Integer", "nillable": true, "crs": null }
        ],
        "default_geometry": null
    })
}

pub fn roads_collection(roads: &[RoadSpec]) -> Value {
    let features = roads
        .iter()
        .map(|road| {
            (
                road.id.clone(),
                json!({ "values": [{ "Text": road.name }, { "Integer": road.lanes }] }),
            )
        })
        .collect::<serde_json::Map<_, _>>();

    json!({
        "path": "roads",
        "feature_type": roads_type(),
        "features": features,
    })
}

/// Import file next to the repository, named uniquely per call
pub fn write_roads(dir: &Path, roads: &[RoadSpec]) -> PathBuf {
    let index = IMPORTS.fetch_add(1, Ordering::SeqCst);
    let path = dir.join(format!("roads-{index}.json"));
    std::fs::write(&path, roads_collection(roads).to_string()).expect("Failed to write import file");
    path
}
