//! Selective loading: fetch group members without touching the segment
//! block, then materialize segments on demand.
//!
//! Run with: cargo run --example lazy_fetch

use iidfile::{Fetch, Iid, IidFile, Mask, Segment};

fn main() -> Result<(), iidfile::Error> {
    let dir = std::env::temp_dir();
    let path = dir.join("iidfile_lazy_demo.iid");

    // One entry per group.
    let mut file = IidFile::new();
    for (i, group) in ["a", "b", "c"].into_iter().enumerate() {
        let mask = Mask::from_rows(&[&[true, true, true]]);
        let seg = Segment::from_mask(&mask, (i as u16 * 10, 0))?;
        let address = format!("member-of-{}", group);
        file.add(Iid::new(b"demo", address), seg, Some(group))?;
    }
    file.save(&path)?;

    let mut file = IidFile::open(&path)?;

    // Group names are readable without materializing anything.
    println!("groups on disk: {:?}", file.group_names());

    // Load only group "b", and only the IID half.
    let entries = file.fetch(&Fetch::new().groups(["b"]).iids(true).segs(false))?;
    for entry in &entries {
        println!(
            "key {}: address {:?}, segment loaded: {}",
            entry.key(),
            String::from_utf8_lossy(entry.iid().unwrap().address()),
            entry.seg().is_some(),
        );
    }
    drop(entries);
    println!("fully loaded: {}", file.is_fully_loaded());

    // A point query now needs the other segments; top them up first.
    file.fetch(&Fetch::all_keys().iids(false))?;
    let hits = file.at(0, 10)?;
    println!("{} entries cover pixel (0, 10)", hits.len());

    std::fs::remove_file(&path).ok();
    Ok(())
}
