use std::fs;

use camino::Utf8PathBuf;
use zinc_harvest::domain::ZincId;
use zinc_harvest::store::{Store, StorePaths};

fn temp_root() -> (tempfile::TempDir, Utf8PathBuf) {
    let temp = tempfile::tempdir().unwrap();
    let root = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).unwrap();
    (temp, root)
}

#[test]
fn ids_round_trip_through_artifact() {
    let (_temp, root) = temp_root();
    let path = root.join("zinc_ids").join("zinc_ids_EF.txt");
    let ids = vec![
        ZincId::normalize("ZINC5").unwrap(),
        ZincId::normalize("ZINC17").unwrap(),
    ];

    Store::write_ids_atomic(&path, &ids).unwrap();
    assert_eq!(
        fs::read_to_string(path.as_std_path()).unwrap(),
        "ZINC000000000005\nZINC000000000017\n"
    );
    assert_eq!(Store::read_ids(&path).unwrap(), ids);

    let leftovers = fs::read_dir(root.join("zinc_ids").as_std_path())
        .unwrap()
        .count();
    assert_eq!(leftovers, 1);
}

#[test]
fn reader_skips_blank_and_foreign_lines() {
    let (_temp, root) = temp_root();
    let path = root.join("zinc_ids.txt");
    fs::write(
        path.as_std_path(),
        "ZINC000000000001\n\n  \nCHEMBL25\nZINC2\n",
    )
    .unwrap();
    let ids = Store::read_ids(&path).unwrap();
    let ids = ids.iter().map(ZincId::as_str).collect::<Vec<_>>();
    assert_eq!(ids, vec!["ZINC000000000001", "ZINC000000000002"]);
}

#[test]
fn stale_work_list_is_removed_once() {
    let (_temp, root) = temp_root();
    let store = Store::new(StorePaths {
        bucket_dir: root.join("zinc_ids"),
        work_list: root.join("zinc_ids.txt"),
        output_dir: root.join("set_1"),
    });
    fs::write(store.work_list_path().as_std_path(), "ZINC1\n").unwrap();

    assert!(store.remove_work_list().unwrap());
    assert!(!store.remove_work_list().unwrap());
}

#[test]
fn clear_dir_removes_files_and_subdirectories() {
    let (_temp, root) = temp_root();
    let dir = root.join("set_1");
    fs::create_dir_all(dir.join("nested").as_std_path()).unwrap();
    fs::write(dir.join("ZINC000000000001.sdf").as_std_path(), "x").unwrap();
    fs::write(dir.join("nested/inner.sdf").as_std_path(), "y").unwrap();

    let report = Store::clear_dir(&dir);
    assert_eq!(report.removed, 2);
    assert_eq!(report.failed, 0);
    assert!(report.listing_error.is_none());
    assert_eq!(fs::read_dir(dir.as_std_path()).unwrap().count(), 0);
}

#[test]
fn clearing_a_missing_dir_is_a_no_op() {
    let (_temp, root) = temp_root();
    let report = Store::clear_dir(&root.join("never-created"));
    assert_eq!(report.removed, 0);
    assert!(report.listing_error.is_none());
}
