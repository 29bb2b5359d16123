//! Basic usage: build a file, save it, read it back, run queries.
//!
//! Run with: cargo run --example basic

use iidfile::{Fetch, Iid, IidFile, Mask, Segment};

fn main() -> Result<(), iidfile::Error> {
    let dir = std::env::temp_dir();
    let path = dir.join("iidfile_basic_demo.iid");

    // Build an in-memory file with two segmented individuals.
    let mut file = IidFile::new();

    let tree = Mask::from_rows(&[
        &[false, true, false],
        &[true, true, true],
        &[false, true, false],
    ]);
    let key = file.add(
        Iid::new(b"demo", b"tree-1"),
        Segment::from_mask(&tree, (10, 10))?,
        Some("trees"),
    )?;
    println!("added tree-1 with key {}", key);

    let rock = Mask::from_rows(&[&[true, true], &[true, true]]);
    file.add(
        Iid::new(b"demo", b"rock-1"),
        Segment::from_mask(&rock, (11, 11))?,
        Some("rocks"),
    )?;

    file.meta_mut().set(serde_json::json!({
        "image": { "width": 64, "height": 64 },
    }));

    file.save(&path)?;
    println!("saved {:?}", path);

    // Read it back and materialize everything.
    let mut file = IidFile::open(&path)?;
    println!("groups: {:?}", file.group_names());

    for entry in file.fetch(&Fetch::everything())? {
        let iid = entry.iid().unwrap();
        let seg = entry.seg().unwrap();
        println!(
            "key {}: {}/{} covers {} pixels in {:?}",
            entry.key(),
            String::from_utf8_lossy(iid.domain()),
            String::from_utf8_lossy(iid.address()),
            seg.area(),
            seg.bbox(),
        );
    }

    // Point query: who owns pixel (x=11, y=11)?
    let hits = file.at(11, 11)?;
    println!("{} entries cover pixel (11, 11)", hits.len());

    // Which loaded segments overlap?
    for (a, b) in file.compute_overlap() {
        println!("keys {} and {} overlap", a, b);
    }

    std::fs::remove_file(&path).ok();
    Ok(())
}
