use gtfs_atlas_core::notice::NOTICE_CODE_MISSING_FILE;
use gtfs_atlas_core::{
    FeedLoader, GtfsFeed, LayoutMode, LoadOptions, LookupError, LookupPolicy, NoticeContainer,
    RouteThroughStop, StopIndex, TripSegmenter, REQUIRED_FILES,
};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

fn project_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .parent() // crates/
        .unwrap()
        .parent() // root
        .unwrap()
        .to_path_buf()
}

fn test_feeds_root() -> PathBuf {
    project_root().join("test-gtfs-feeds")
}

fn scratch_dir(prefix: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    let dir = std::env::temp_dir().join(format!("{prefix}_{}_{nanos}", std::process::id()));
    fs::create_dir_all(&dir).unwrap();
    dir
}

fn copy_feed(from: &Path, to: &Path) {
    fs::create_dir_all(to).unwrap();
    for entry in fs::read_dir(from).unwrap() {
        let path = entry.unwrap().path();
        if path.is_file() {
            fs::copy(&path, to.join(path.file_name().unwrap())).unwrap();
        }
    }
}

fn flat_feed() -> GtfsFeed {
    GtfsFeed::load(test_feeds_root().join("flat")).expect("load flat feed")
}

#[test]
fn loads_flat_fixture() {
    let mut notices = NoticeContainer::new();
    let feed = FeedLoader::default()
        .load_with_notices(test_feeds_root().join("flat"), &mut notices)
        .expect("load flat feed");

    assert_eq!(feed.sources(), ["."]);
    assert_eq!(feed.agency().len(), 1);
    assert_eq!(feed.stops().len(), 4);
    assert_eq!(feed.routes().len(), 2);
    assert_eq!(feed.trips().len(), 3);
    assert_eq!(feed.stop_times().len(), 9);
    assert_eq!(feed.calendar_dates().len(), 2);
    assert_eq!(feed.shapes().map(|shapes| shapes.len()), Some(3));
    assert!(notices.is_empty(), "unexpected notices: {:?}", notices);

    assert_eq!(feed.stops().extra_value(0, "platform_side"), Some("left"));
    assert_eq!(feed.stops().extra_value(3, "platform_side"), None);
}

#[test]
fn merges_area_subfolders() {
    let mut notices = NoticeContainer::new();
    let feed = FeedLoader::default()
        .load_with_notices(test_feeds_root().join("areas"), &mut notices)
        .expect("load area feed");

    assert_eq!(feed.sources(), ["north", "south"]);
    assert_eq!(feed.agency().len(), 2);
    assert_eq!(feed.stops().len(), 5);
    assert_eq!(feed.stops().rows[0].stop_id, "N1");
    assert_eq!(feed.stops().rows[3].stop_id, "M1");
    assert_eq!(feed.stop_times().len(), 5);
    assert_eq!(feed.calendar_dates().len(), 1);
    assert_eq!(feed.shapes().map(|shapes| shapes.len()), Some(2));
    assert!(feed.stops().headers.contains(&"wheelchair_boarding".to_string()));

    let missing: Vec<String> = notices
        .iter()
        .filter(|notice| notice.code == NOTICE_CODE_MISSING_FILE)
        .map(|notice| notice.to_string())
        .collect();
    assert_eq!(missing.len(), 1);
    assert!(missing[0].contains("south/calendar_dates.txt"));
}

#[test]
fn single_subfolder_matches_flat_layout() {
    let dir = scratch_dir("gtfs_parity");
    copy_feed(&test_feeds_root().join("flat"), &dir.join("only"));

    let flat = flat_feed();
    let nested = GtfsFeed::load(&dir).expect("load nested feed");

    assert_eq!(nested.sources(), ["only"]);
    assert_eq!(nested.agency().rows, flat.agency().rows);
    assert_eq!(nested.stops().rows, flat.stops().rows);
    assert_eq!(nested.routes().rows, flat.routes().rows);
    assert_eq!(nested.trips().rows, flat.trips().rows);
    assert_eq!(nested.stop_times().rows, flat.stop_times().rows);
    assert_eq!(nested.calendar_dates().rows, flat.calendar_dates().rows);
    assert_eq!(
        nested.shapes().map(|shapes| &shapes.rows),
        flat.shapes().map(|shapes| &shapes.rows)
    );

    fs::remove_dir_all(&dir).ok();
}

#[test]
fn identical_subfolders_double_every_table() {
    let dir = scratch_dir("gtfs_double");
    copy_feed(&test_feeds_root().join("flat"), &dir.join("a"));
    copy_feed(&test_feeds_root().join("flat"), &dir.join("b"));

    let flat = flat_feed();
    let doubled = GtfsFeed::load(&dir).expect("load doubled feed");

    assert_eq!(doubled.agency().len(), 2 * flat.agency().len());
    assert_eq!(doubled.stops().len(), 2 * flat.stops().len());
    assert_eq!(doubled.routes().len(), 2 * flat.routes().len());
    assert_eq!(doubled.trips().len(), 2 * flat.trips().len());
    assert_eq!(doubled.stop_times().len(), 2 * flat.stop_times().len());
    assert_eq!(doubled.calendar_dates().len(), 2 * flat.calendar_dates().len());

    // Duplicated keys still resolve, to the first folder's rows.
    let routes = StopIndex::new(&doubled).routes_through("S2").unwrap();
    assert_eq!(routes.len(), 2);

    fs::remove_dir_all(&dir).ok();
}

#[test]
fn zip_archive_matches_directory() {
    use std::io::Write;
    use zip::write::{FileOptions, ZipWriter};

    let dir = scratch_dir("gtfs_zip_parity");
    let zip_path = dir.join("flat.zip");
    let mut writer = ZipWriter::new(fs::File::create(&zip_path).unwrap());
    for entry in fs::read_dir(test_feeds_root().join("flat")).unwrap() {
        let path = entry.unwrap().path();
        let name = path.file_name().unwrap().to_string_lossy().into_owned();
        writer.start_file(name, FileOptions::default()).unwrap();
        writer.write_all(&fs::read(&path).unwrap()).unwrap();
    }
    writer.finish().unwrap();

    let from_zip = GtfsFeed::load(&zip_path).expect("load zip feed");
    let from_dir = flat_feed();

    assert_eq!(from_zip.sources(), ["."]);
    assert_eq!(from_zip.stops().rows, from_dir.stops().rows);
    assert_eq!(from_zip.stop_times().rows, from_dir.stop_times().rows);
    assert_eq!(from_zip.stops().extra_columns, from_dir.stops().extra_columns);

    fs::remove_dir_all(&dir).ok();
}

#[test]
fn forced_subfolder_layout_ignores_root_files() {
    let feed = FeedLoader::with_options(LoadOptions::default().with_layout(LayoutMode::Subfolders))
        .load(test_feeds_root().join("flat"))
        .expect("load flat feed as subfolders");

    assert!(feed.sources().is_empty());
    assert!(feed.stops().is_empty());
    assert_eq!(REQUIRED_FILES.len(), 6);
}

#[test]
fn routes_through_central_stop() {
    let feed = flat_feed();
    let routes = StopIndex::new(&feed).routes_through("S2").unwrap();

    assert_eq!(
        routes,
        vec![
            RouteThroughStop {
                route_id: "R1".into(),
                route_name: Some("1".into()),
                previous_stop_id: "S1".into(),
                next_stop_id: "S3".into(),
            },
            RouteThroughStop {
                route_id: "R2".into(),
                route_name: Some("2".into()),
                previous_stop_id: "S4".into(),
                next_stop_id: "S1".into(),
            },
        ]
    );
}

#[test]
fn terminal_stop_fails_strict_but_not_lenient_plot() {
    let feed = flat_feed();
    let index = StopIndex::new(&feed);

    assert_eq!(
        index.routes_through("S1").unwrap_err(),
        LookupError::MissingNeighbor {
            trip_id: "T1".into(),
            stop_sequence: 0,
        }
    );
    assert!(index.plot_table(LookupPolicy::Strict).is_err());

    let rows = index.plot_table(LookupPolicy::SkipUnresolved).unwrap();
    let lines: Vec<(&str, Vec<String>)> = rows
        .iter()
        .map(|row| (row.position.stop_id.as_str(), row.lines.clone()))
        .collect();
    assert_eq!(
        lines,
        vec![
            ("S1", vec![]),
            ("S2", vec!["1".to_string(), "2".to_string()]),
            ("S3", vec![]),
            ("S4", vec![]),
        ]
    );
}

#[test]
fn segments_and_interpolation_over_shape() {
    let feed = flat_feed();
    let segmenter = TripSegmenter::new(&feed);

    let rows = segmenter.segment_durations("T2");
    let durations: Vec<Option<i64>> = rows
        .iter()
        .map(|row| row.segment_duration.map(|duration| duration.num_seconds()))
        .collect();
    assert_eq!(durations, vec![Some(300), Some(390), None]);

    let segments = segmenter.interpolate_positions(&rows).unwrap();
    assert_eq!(segments.len(), 2);
    let expected = [2.0, 2.0 + 0.2 / 3.0, 2.0 + 0.4 / 3.0];
    for (segment, window) in segments.iter().zip(expected.windows(2)) {
        assert!((segment.start_point.x() - window[0]).abs() < 1e-9);
        assert!((segment.end_point.x() - window[1]).abs() < 1e-9);
        assert!((segment.start_point.y() - 48.0).abs() < 1e-9);
    }
    assert_eq!(
        segments[0].start_time.map(|time| time.to_string()).as_deref(),
        Some("24:10:00")
    );

    let geo = gtfs_atlas_core::to_geo_table(&segments);
    assert_eq!(geo.len(), 2);
    assert_eq!(geo.to_feature_collection().features.len(), 2);

    assert!(segmenter.interpolate_trip("T3").is_err());
}
