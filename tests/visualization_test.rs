//! End-to-end rendering through the shared cache.
//!
//! Run: cargo test --test visualization_test

#![allow(clippy::unwrap_used, clippy::expect_used)]

use som_viz::prelude::*;
use som_viz::visualizers::VisualizerCategory;

/// 4×4 map with 3-dim weights spanning a colour cube.
fn trained_map() -> Som {
    Som::from_fn(4, 4, 3, |x, y| vec![x as f64 / 3.0, y as f64 / 3.0, ((x + y) % 2) as f64]).unwrap()
}

/// Same map with one input near every unit and two classes split by column.
fn labelled_map() -> Som {
    let som = trained_map();
    let rows: Vec<Vec<f64>> = (0..som.unit_count())
        .map(|u| som.weight_at(u).iter().map(|w| w + 0.01).collect())
        .collect();
    let labels: Vec<&str> = (0..som.unit_count())
        .map(|u| if som.coords(u).0 < 2 { "left" } else { "right" })
        .collect();
    som.with_inputs(
        SharedInputObjects::new()
            .with_input_data(InputData::from_rows(&rows).unwrap())
            .with_class_info(ClassInfo::from_labels(&labels)),
    )
    .unwrap()
    .map_inputs()
    .unwrap()
}

fn rainbow() -> Arc<Palette> {
    Arc::new(GradientFactory::palette("rainbow", 256).unwrap())
}

// ============================================================================
// Cache behaviour
// ============================================================================

#[test]
fn test_umatrix_second_call_served_from_cache() {
    let cache = ImageCache::shared(DEFAULT_MAX_BYTES);
    let umatrix = UMatrix::new(Arc::clone(&cache), rainbow());
    let som = trained_map();

    let first = umatrix.get_visualization(0, &som, 400, 400).unwrap();
    assert_eq!(cache.hits(), 0);
    let second = umatrix.get_visualization(0, &som, 400, 400).unwrap();

    assert_eq!(cache.hits(), 1);
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!((second.width(), second.height()), (400, 400));
}

#[test]
fn test_changed_size_misses_cache() {
    let cache = ImageCache::shared(DEFAULT_MAX_BYTES);
    let umatrix = UMatrix::new(Arc::clone(&cache), rainbow());
    let som = trained_map();

    umatrix.get_visualization(0, &som, 100, 100).unwrap();
    umatrix.get_visualization(0, &som, 120, 100).unwrap();
    assert_eq!(cache.hits(), 0);
    assert_eq!(cache.len(), 2);
    assert_eq!(umatrix.invalidate(), 2);
    assert!(cache.is_empty());
}

#[test]
fn test_cache_bound_holds_across_visualizers() {
    // Room for two 50×50 RGBA images.
    let cache = ImageCache::shared(2 * 50 * 50 * 4);
    let umatrix = UMatrix::new(Arc::clone(&cache), rainbow());
    let dmatrix = DMatrix::new(Arc::clone(&cache), rainbow());
    let som = trained_map();

    umatrix.get_visualization(0, &som, 50, 50).unwrap();
    dmatrix.get_visualization(0, &som, 50, 50).unwrap();
    dmatrix.get_visualization(1, &som, 50, 50).unwrap();

    assert_eq!(cache.len(), 2);
    assert!(cache.total_bytes() <= cache.max_bytes());
}

// ============================================================================
// Registry
// ============================================================================

#[test]
fn test_registry_renders_every_available_visualizer() {
    let cache = ImageCache::shared(DEFAULT_MAX_BYTES);
    let registry = Registry::with_defaults(Arc::clone(&cache), rainbow(), &EngineConfig::default());
    let som = labelled_map();

    let available: Vec<&dyn Visualizer> = registry.available_for(&som).collect();
    assert_eq!(available.len(), registry.len());
    for vis in available {
        let image = vis.get_visualization(0, &som, 64, 48).unwrap();
        assert_eq!((image.width(), image.height()), (64, 48), "{}", vis.name());
    }
}

#[test]
fn test_registry_hides_visualizers_without_inputs() {
    let registry = Registry::with_defaults(
        ImageCache::shared(DEFAULT_MAX_BYTES),
        rainbow(),
        &EngineConfig::default(),
    );
    let som = trained_map();
    let names: Vec<&str> = registry
        .available_for(&som)
        .map(|v| v.info().short_name.as_str())
        .collect();

    assert!(names.contains(&"UMatrix"));
    assert!(names.contains(&"MetroMap"));
    assert!(!names.contains(&"PMatrix"));
    assert!(!names.contains(&"ClassMap"));

    let err = registry
        .get("PMatrix")
        .unwrap()
        .get_visualization(0, &som, 10, 10)
        .unwrap_err();
    assert!(matches!(err, Error::MissingInputObjects { .. }));
}

#[test]
fn test_registry_ordered_by_category() {
    let registry = Registry::with_defaults(
        ImageCache::shared(DEFAULT_MAX_BYTES),
        rainbow(),
        &EngineConfig::default(),
    );
    let categories: Vec<VisualizerCategory> = registry.iter().map(|v| v.info().category).collect();
    assert!(categories.windows(2).all(|w| w[0] <= w[1]));
}

// ============================================================================
// Files
// ============================================================================

#[test]
fn test_palette_file_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("rainbow.xml");
    let mut palette = GradientFactory::palette("rainbow", 64).unwrap();
    palette.reverse();
    palette.save(&path).unwrap();

    let loaded = Palette::load(&path).unwrap();
    assert_eq!(loaded, palette);
    assert_eq!(loaded.content_hash(), palette.content_hash());
}

#[test]
fn test_export_writes_png() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("hits.png");
    let cache = ImageCache::shared(DEFAULT_MAX_BYTES);
    let hits = HitHistogram::new(cache, rainbow());

    PngEncoder::export(&hits, 0, &labelled_map(), 32, 32, &path).unwrap();
    let bytes = std::fs::read(&path).unwrap();
    assert_eq!(&bytes[0..8], &[137, 80, 78, 71, 13, 10, 26, 10]);
}
