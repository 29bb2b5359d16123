// Query-surface tests: point and rectangle lookup, address search,
// attribute filtering, and the pairwise overlap graph.

use iidfile::{BBox, Fetch, Filter, Iid, IidFile, Mask, RegionTest, Segment};
use tempfile::TempDir;

fn segment(rows: &[&[bool]], origin: (u16, u16)) -> Segment {
    Segment::from_mask(&Mask::from_rows(rows), origin).unwrap()
}

const T: bool = true;
const F: bool = false;

/// Two entries with partially overlapping masks: one overlap edge, and a
/// shared pixel reports both.
#[test]
fn test_overlap_graph() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("overlap.iid");

    let mut file = IidFile::new();
    // 2x2 blocks at (0,0) and (1,1): they share pixel (1,1).
    file.add(Iid::new(b"d", b"a"), segment(&[&[T, T], &[T, T]], (0, 0)), None).unwrap();
    file.add(Iid::new(b"d", b"b"), segment(&[&[T, T], &[T, T]], (1, 1)), None).unwrap();
    // A third far away, overlapping nothing.
    file.add(Iid::new(b"d", b"c"), segment(&[&[T]], (30, 30)), None).unwrap();
    file.save(&path).unwrap();

    let mut file = IidFile::open(&path).unwrap();
    file.fetch(&Fetch::everything()).unwrap();

    assert_eq!(file.compute_overlap(), vec![(0, 1)]);

    // The shared pixel (row 1, col 1) reports both entries.
    let hits = file.at(1, 1).unwrap();
    let mut keys: Vec<u32> = hits.iter().map(|e| e.key()).collect();
    keys.sort_unstable();
    assert_eq!(keys, vec![0, 1]);

    // A pixel owned by one block alone reports it alone.
    let hits = file.at(0, 0).unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].key(), 0);
}

/// `find` agrees with a linear scan over all IIDs.
#[test]
fn test_find_matches_linear_scan() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("find.iid");

    let mut file = IidFile::new();
    for (domain, address) in
        [(b"cam1" as &[u8], b"tree" as &[u8]), (b"cam1", b"rock"), (b"cam2", b"tree"), (b"cam2", b"pond")]
    {
        let origin = (file.len() as u16, 0);
        file.add(Iid::new(domain, address), segment(&[&[T]], origin), None).unwrap();
    }
    file.save(&path).unwrap();

    let mut file = IidFile::open(&path).unwrap();
    let tree: &[&[u8]] = &[b"tree"];

    let found: Vec<u32> = file
        .find(tree, None, None)
        .unwrap()
        .iter()
        .map(|e| e.key())
        .collect();

    let scanned: Vec<u32> = file
        .fetch(&Fetch::all_keys().segs(false))
        .unwrap()
        .iter()
        .filter(|e| e.iid().map_or(false, |i| i.address() == b"tree"))
        .map(|e| e.key())
        .collect();

    assert_eq!(found, scanned);
    assert_eq!(found, vec![0, 2]);

    // Domain constraint narrows the result.
    let cam2: &[&[u8]] = &[b"cam2"];
    let narrowed = file.find(tree, Some(cam2), None).unwrap();
    assert_eq!(narrowed.len(), 1);
    assert_eq!(narrowed[0].key(), 2);

    // Unknown address finds nothing.
    let lake: &[&[u8]] = &[b"lake"];
    assert!(file.find(lake, None, None).unwrap().is_empty());
}

/// Rectangle queries: coarse mode over-matches inside the envelope,
/// exact mode requires a shared set pixel.
#[test]
fn test_region_query_coarse_and_exact() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("region.iid");

    let mut file = IidFile::new();
    // A hollow shape: corners set, center empty. Envelope is 3x3.
    file.add(
        Iid::new(b"d", b"corners"),
        segment(&[&[T, F, T], &[F, F, F], &[T, F, T]], (0, 0)),
        None,
    )
    .unwrap();
    file.add(Iid::new(b"d", b"far"), segment(&[&[T]], (20, 20)), None).unwrap();
    file.save(&path).unwrap();

    let mut file = IidFile::open(&path).unwrap();

    // The hollow center: inside the envelope, no set pixel.
    let center = BBox::new(1, 1, 2, 2).unwrap();
    let coarse = file.region(&center, RegionTest::Coarse, false).unwrap();
    assert_eq!(coarse.len(), 1);
    assert_eq!(coarse[0].key(), 0);
    drop(coarse);
    assert!(file.region(&center, RegionTest::Exact, false).unwrap().is_empty());

    // A window over one corner matches exactly.
    let corner = BBox::new(0, 0, 1, 1).unwrap();
    let exact = file.region(&corner, RegionTest::Exact, false).unwrap();
    assert_eq!(exact.len(), 1);
    assert_eq!(exact[0].key(), 0);

    // A window nothing touches.
    let nowhere = BBox::new(10, 10, 12, 12).unwrap();
    assert!(file.region(&nowhere, RegionTest::Coarse, false).unwrap().is_empty());
}

/// `only_loaded` rectangle queries never touch the segment block.
#[test]
fn test_region_query_only_loaded() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("loaded.iid");

    let mut file = IidFile::new();
    file.add(Iid::new(b"d", b"a"), segment(&[&[T]], (0, 0)), None).unwrap();
    file.add(Iid::new(b"d", b"b"), segment(&[&[T]], (0, 1)), None).unwrap();
    file.save(&path).unwrap();

    let mut file = IidFile::open(&path).unwrap();
    let everything = BBox::new(0, 0, 5, 5).unwrap();

    // Nothing is materialized, so nothing matches and nothing loads.
    assert!(file.region(&everything, RegionTest::Exact, true).unwrap().is_empty());
    assert!(!file.entry(0).unwrap().is_fully_loaded());

    // Load one key; only it is visible to only_loaded queries.
    file.fetch(&Fetch::new().keys([1])).unwrap();
    let visible = file.region(&everything, RegionTest::Exact, true).unwrap();
    assert_eq!(visible.len(), 1);
    assert_eq!(visible[0].key(), 1);

    // Without only_loaded the query materializes the rest.
    let all = file.region(&everything, RegionTest::Exact, false).unwrap();
    assert_eq!(all.len(), 2);
}

/// Attribute filtering over loaded entries: groups, domains, area.
#[test]
fn test_filter() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("filter.iid");

    let mut file = IidFile::new();
    // Areas 1, 4, and 6.
    file.add(Iid::new(b"cam1", b"s"), segment(&[&[T]], (0, 0)), Some("small")).unwrap();
    file.add(Iid::new(b"cam2", b"m"), segment(&[&[T, T], &[T, T]], (5, 0)), Some("big")).unwrap();
    file.add(Iid::new(b"cam2", b"l"), segment(&[&[T, T, T], &[T, T, T]], (10, 0)), Some("big"))
        .unwrap();
    file.save(&path).unwrap();

    let mut file = IidFile::open(&path).unwrap();
    file.fetch(&Fetch::everything()).unwrap();

    // Area bounds are exclusive.
    let mid = file.filter(&Filter::new().area(Some(1), Some(6))).unwrap();
    assert_eq!(mid.len(), 1);
    assert_eq!(mid[0].key(), 1);
    drop(mid);

    let big = file.filter(&Filter::new().groups(["big"])).unwrap();
    assert_eq!(big.len(), 2);
    drop(big);

    let cam2_large = file
        .filter(&Filter::new().domains([b"cam2" as &[u8]]).area(Some(4), None))
        .unwrap();
    assert_eq!(cam2_large.len(), 1);
    assert_eq!(cam2_large[0].key(), 2);
}

/// Filtering excludes entries whose tested attribute is unresolved.
#[test]
fn test_filter_skips_unresolved() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("unresolved.iid");

    let mut file = IidFile::new();
    file.add(Iid::new(b"d", b"a"), segment(&[&[T]], (0, 0)), None).unwrap();
    file.add(Iid::new(b"d", b"b"), segment(&[&[T]], (1, 0)), None).unwrap();
    file.save(&path).unwrap();

    let mut file = IidFile::open(&path).unwrap();
    // Only key 0 gets its segment; key 1 stays unresolved.
    file.fetch(&Fetch::new().keys([0])).unwrap();

    let by_area = file.filter(&Filter::new().area(Some(0), None)).unwrap();
    assert_eq!(by_area.len(), 1);
    assert_eq!(by_area[0].key(), 0);
    drop(by_area);

    let by_domain = file.filter(&Filter::new().domains([b"d" as &[u8]])).unwrap();
    assert_eq!(by_domain.len(), 1);
}

/// `find` restricted to groups only materializes those IIDs.
#[test]
fn test_find_within_groups() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("findgroup.iid");

    let mut file = IidFile::new();
    file.add(Iid::new(b"d", b"x"), segment(&[&[T]], (0, 0)), Some("a")).unwrap();
    file.add(Iid::new(b"d", b"x2"), segment(&[&[T]], (1, 0)), Some("b")).unwrap();
    file.save(&path).unwrap();

    let mut file = IidFile::open(&path).unwrap();
    let x: &[&[u8]] = &[b"x"];
    let hits = file.find(x, None, Some(&["a"])).unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].key(), 0);
    drop(hits);

    // The other group's IID was never materialized.
    assert!(file.entry(1).unwrap().iid().is_none());

    // Searching the wrong group finds nothing, even for a present address.
    assert!(file.find(x, None, Some(&["b"])).unwrap().is_empty());
}
