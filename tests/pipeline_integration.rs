//! End-to-end pipeline tests against a real mbtiles archive on disk.

use flate2::read::GzDecoder;
use std::io::Read;
use std::sync::Arc;
use tempfile::TempDir;

use tilepress::archive::{MbtilesArchive, TilesetInfo};
use tilepress::config::PipelineConfig;
use tilepress::coord::{LatLonBounds, TileCoord};
use tilepress::pipeline::{run_pipeline, run_pipeline_with_telemetry, PipelineError, PipelineSummary};
use tilepress::telemetry::TelemetryRegistry;
use tilepress::tile::{
    FeatureStore, LayerFeature, PostProcessorRegistry, TileBuildError, TileData, TileFeatures,
};

/// A tile whose contents are a number and a payload size; equal contents
/// build byte-identical tiles.
struct StaticTile {
    coord: TileCoord,
    contents: u64,
    features_to_emit: u64,
    payload_len: usize,
    fail_build: bool,
}

impl StaticTile {
    fn new(coord: TileCoord, contents: u64) -> Self {
        Self {
            coord,
            contents,
            features_to_emit: 1,
            payload_len: 8,
            fail_build: false,
        }
    }

    fn with_features(mut self, features: u64) -> Self {
        self.features_to_emit = features;
        self
    }

    fn with_payload_len(mut self, len: usize) -> Self {
        self.payload_len = len;
        self
    }

    fn failing(mut self) -> Self {
        self.fail_build = true;
        self
    }
}

impl TileFeatures for StaticTile {
    fn coord(&self) -> TileCoord {
        self.coord
    }

    fn num_features_to_emit(&self) -> u64 {
        self.features_to_emit
    }

    fn num_features_processed(&self) -> u64 {
        self.features_to_emit
    }

    fn build_tile(&self) -> Result<TileData, TileBuildError> {
        if self.fail_build {
            return Err(TileBuildError::new("injected build failure"));
        }
        let mut tile = TileData::new();
        tile.push_layer(
            "main",
            vec![LayerFeature::new(
                self.contents,
                vec![self.contents as u8; self.payload_len],
            )],
        );
        Ok(tile)
    }

    fn has_same_contents(&self, other: &dyn TileFeatures) -> bool {
        match (self.build_tile(), other.build_tile()) {
            (Ok(a), Ok(b)) => a == b,
            _ => false,
        }
    }
}

struct VecStore {
    tiles: Vec<Arc<dyn TileFeatures>>,
}

impl VecStore {
    fn new(tiles: Vec<StaticTile>) -> Box<Self> {
        Box::new(Self {
            tiles: tiles
                .into_iter()
                .map(|t| Arc::new(t) as Arc<dyn TileFeatures>)
                .collect(),
        })
    }
}

impl FeatureStore for VecStore {
    fn num_features(&self) -> u64 {
        self.tiles.iter().map(|t| t.num_features_to_emit()).sum()
    }

    fn into_iter(self: Box<Self>) -> Box<dyn Iterator<Item = Arc<dyn TileFeatures>> + Send> {
        Box::new(self.tiles.into_iter())
    }
}

fn quick_config() -> PipelineConfig {
    PipelineConfig {
        log_interval: std::time::Duration::from_secs(3600),
        ..Default::default()
    }
}

async fn run_to_archive(
    tiles: Vec<StaticTile>,
    config: PipelineConfig,
) -> (Result<PipelineSummary, PipelineError>, MbtilesArchive) {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("out.mbtiles");
    let archive = MbtilesArchive::open(&path).unwrap();
    let result = run_pipeline(
        VecStore::new(tiles),
        Box::new(archive),
        PostProcessorRegistry::new(),
        TilesetInfo::default(),
        config,
    )
    .await;
    (result, MbtilesArchive::open(&path).unwrap())
}

fn gunzip(bytes: &[u8]) -> Vec<u8> {
    let mut decoder = GzDecoder::new(bytes);
    let mut out = Vec::new();
    decoder.read_to_end(&mut out).unwrap();
    out
}

#[tokio::test(flavor = "multi_thread")]
async fn empty_stream_writes_only_metadata() {
    let (result, archive) = run_to_archive(Vec::new(), quick_config()).await;
    let summary = result.unwrap();

    assert_eq!(summary.tiles_written, 0);
    assert_eq!(summary.features_processed, 0);
    assert_eq!(archive.tile_count().unwrap(), 0);
    assert_eq!(archive.metadata_value("format").unwrap().unwrap(), "pbf");
}

#[tokio::test(flavor = "multi_thread")]
async fn single_tile_at_zoom_zero() {
    let bounds = LatLonBounds::new(-10.0, -10.0, 10.0, 10.0);
    let mut config = PipelineConfig::for_bounds(bounds, 0, 14);
    config.log_interval = std::time::Duration::from_secs(3600);

    let tiles = vec![StaticTile::new(TileCoord::of_xyz(0, 0, 0), 1)];
    let (result, archive) = run_to_archive(tiles, config).await;
    let summary = result.unwrap();

    assert_eq!(summary.tiles_written, 1);
    assert_eq!(archive.tile_rows().unwrap(), vec![(0, 0, 0)]);
    assert_eq!(
        archive.metadata_value("bounds").unwrap().unwrap(),
        bounds.bounds_string()
    );
    assert_eq!(archive.metadata_value("minzoom").unwrap().unwrap(), "0");
    assert_eq!(archive.metadata_value("maxzoom").unwrap().unwrap(), "14");
}

#[tokio::test(flavor = "multi_thread")]
async fn identical_adjacent_tiles_are_memoized() {
    // Ascending coord order within a column runs from the south edge up.
    let tiles = vec![
        StaticTile::new(TileCoord::of_xyz(0, 2, 14), 7),
        StaticTile::new(TileCoord::of_xyz(0, 1, 14), 7),
        StaticTile::new(TileCoord::of_xyz(0, 0, 14), 7),
    ];
    let (result, archive) = run_to_archive(tiles, quick_config()).await;
    let summary = result.unwrap();

    assert_eq!(summary.tiles_written, 3);
    assert_eq!(summary.memoized_tiles, 2);

    let a = archive.tile(TileCoord::of_xyz(0, 2, 14)).unwrap().unwrap();
    let b = archive.tile(TileCoord::of_xyz(0, 1, 14)).unwrap().unwrap();
    let c = archive.tile(TileCoord::of_xyz(0, 0, 14)).unwrap().unwrap();
    assert_eq!(a, b);
    assert_eq!(b, c);
}

#[tokio::test(flavor = "multi_thread")]
async fn batches_split_on_both_bounds() {
    // 1001 z13 tiles of 1000 features each fill ten-tile batches; the final
    // z14 tile's 10_000 features force it into a batch of its own.
    let mut tiles: Vec<StaticTile> = Vec::new();
    let mut coords: Vec<TileCoord> = (0..1001).map(|i| TileCoord::of_xyz(i, 0, 13)).collect();
    coords.sort();
    for coord in coords {
        tiles.push(StaticTile::new(coord, 1).with_features(1_000));
    }
    tiles.push(StaticTile::new(TileCoord::of_xyz(0, 16383, 14), 2).with_features(10_000));

    let dir = TempDir::new().unwrap();
    let path = dir.path().join("out.mbtiles");
    let archive = MbtilesArchive::open(&path).unwrap();
    let telemetry = Arc::new(TelemetryRegistry::new(14));
    let summary = run_pipeline_with_telemetry(
        VecStore::new(tiles),
        Box::new(archive),
        PostProcessorRegistry::new(),
        TilesetInfo::default(),
        quick_config(),
        Arc::clone(&telemetry),
    )
    .await
    .unwrap();

    assert_eq!(summary.tiles_written, 1_002);
    assert_eq!(summary.features_processed, 1_001 * 1_000 + 10_000);
    assert_eq!(telemetry.tiles_at_zoom(13), 1_001);
    assert_eq!(telemetry.tiles_at_zoom(14), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn non_monotonic_input_fails_before_writing() {
    let tiles = vec![
        StaticTile::new(TileCoord::of_xyz(5, 0, 10), 1),
        StaticTile::new(TileCoord::of_xyz(2, 0, 10), 2),
    ];
    let (result, archive) = run_to_archive(tiles, quick_config()).await;

    assert!(matches!(result, Err(PipelineError::TileOrder { .. })));
    // The offending tile never reached the archive.
    assert!(archive.tile(TileCoord::of_xyz(2, 0, 10)).unwrap().is_none());
}

#[tokio::test(flavor = "multi_thread")]
async fn oversized_tile_is_still_written() {
    // Encoded layout overhead for one "main" layer with one feature is 28
    // bytes; this payload puts the encoded size just over 1 MiB.
    let payload_len = 1_048_577 - 28;
    let tiles = vec![StaticTile::new(TileCoord::of_xyz(0, 0, 5), 1).with_payload_len(payload_len)];
    let (result, archive) = run_to_archive(tiles, quick_config()).await;
    result.unwrap();

    let stored = archive.tile(TileCoord::of_xyz(0, 0, 5)).unwrap().unwrap();
    assert_eq!(gunzip(&stored).len(), 1_048_577);
}

#[tokio::test(flavor = "multi_thread")]
async fn build_failure_fails_the_run() {
    let tiles = vec![
        StaticTile::new(TileCoord::of_xyz(0, 3, 2), 1),
        StaticTile::new(TileCoord::of_xyz(1, 0, 2), 2).failing(),
    ];
    let (result, _archive) = run_to_archive(tiles, quick_config()).await;
    assert!(matches!(result, Err(PipelineError::Encode(_))));
}

#[tokio::test(flavor = "multi_thread")]
async fn ordered_topology_writes_strictly_ascending() {
    let mut coords: Vec<TileCoord> = Vec::new();
    for z in 3..=5u8 {
        let n = 1i32 << z;
        for x in 0..n.min(8) {
            for y in 0..n.min(8) {
                coords.push(TileCoord::of_xyz(x, y, z));
            }
        }
    }
    coords.sort();
    let tiles: Vec<StaticTile> = coords
        .iter()
        .enumerate()
        .map(|(i, &coord)| StaticTile::new(coord, i as u64))
        .collect();

    let mut config = quick_config();
    config.threads = 4;
    config.max_tiles_per_batch = 7;
    let (result, archive) = run_to_archive(tiles, config).await;
    result.unwrap();

    let rows = archive.tile_rows().unwrap();
    assert_eq!(rows.len(), coords.len());
    let written: Vec<TileCoord> = rows
        .iter()
        .map(|&(z, x, tms)| TileCoord::of_xyz(x as i32, (1i32 << z) - 1 - tms as i32, z))
        .collect();
    for pair in written.windows(2) {
        assert!(pair[0] < pair[1], "{:?} !< {:?}", pair[0], pair[1]);
    }
    assert_eq!(written, coords);
}

#[tokio::test(flavor = "multi_thread")]
async fn unordered_topology_writes_every_tile() {
    let mut coords: Vec<TileCoord> = (0..64).map(|i| TileCoord::of_xyz(i, i / 2, 9)).collect();
    coords.sort();
    let tiles: Vec<StaticTile> = coords
        .iter()
        .enumerate()
        .map(|(i, &coord)| StaticTile::new(coord, i as u64))
        .collect();

    let mut config = quick_config();
    config.threads = 4;
    config.emit_tiles_in_order = false;
    config.max_tiles_per_batch = 5;
    let (result, archive) = run_to_archive(tiles, config).await;
    result.unwrap();

    assert_eq!(archive.tile_count().unwrap(), 64);
    for coord in coords {
        assert!(archive.tile(coord).unwrap().is_some(), "{:?} missing", coord);
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn repeated_runs_are_byte_identical() {
    let build_tiles = || {
        let mut coords: Vec<TileCoord> = (0..40).map(|i| TileCoord::of_xyz(i, i, 8)).collect();
        coords.sort();
        coords
            .into_iter()
            .enumerate()
            .map(|(i, coord)| StaticTile::new(coord, (i % 5) as u64))
            .collect::<Vec<_>>()
    };

    let mut config = quick_config();
    config.threads = 3;
    let (first_result, first) = run_to_archive(build_tiles(), config.clone()).await;
    let (second_result, second) = run_to_archive(build_tiles(), config).await;
    first_result.unwrap();
    second_result.unwrap();

    for i in 0..40 {
        let coord = TileCoord::of_xyz(i, i, 8);
        assert_eq!(
            first.tile(coord).unwrap().unwrap(),
            second.tile(coord).unwrap().unwrap(),
            "{:?} differs between runs",
            coord
        );
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn post_processor_changes_encoded_output() {
    let tiles = || vec![StaticTile::new(TileCoord::of_xyz(0, 0, 3), 1)];

    let (plain_result, plain) = run_to_archive(tiles(), quick_config()).await;
    plain_result.unwrap();

    let dir = TempDir::new().unwrap();
    let path = dir.path().join("out.mbtiles");
    let archive = MbtilesArchive::open(&path).unwrap();
    let mut postprocessors = PostProcessorRegistry::new();
    postprocessors.register("main", |zoom, mut features| {
        features.push(LayerFeature::new(999, vec![zoom; 4]));
        Ok(Some(features))
    });
    run_pipeline(
        VecStore::new(tiles()),
        Box::new(archive),
        postprocessors,
        TilesetInfo::default(),
        quick_config(),
    )
    .await
    .unwrap();
    let processed = MbtilesArchive::open(&path).unwrap();

    let coord = TileCoord::of_xyz(0, 0, 3);
    assert_ne!(
        plain.tile(coord).unwrap().unwrap(),
        processed.tile(coord).unwrap().unwrap()
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn deferred_index_and_vacuum_complete() {
    let tiles = vec![StaticTile::new(TileCoord::of_xyz(0, 0, 1), 1)];
    let mut config = quick_config();
    config.defer_index_creation = true;
    config.optimize_db = true;
    let (result, archive) = run_to_archive(tiles, config).await;
    result.unwrap();
    assert_eq!(archive.tile_count().unwrap(), 1);
}
