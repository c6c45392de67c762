use std::collections::HashSet;

use zinc_harvest::domain::{FilterBucket, LigandFormat, ZincId, ZincVersion, sort_numeric};

const MW_CODES: [&str; 11] = [
    "200", "250", "300", "325", "350", "375", "400", "425", "450", "500", ">500",
];
const LOGP_CODES: [&str; 11] = [
    "-1", "0", "1", "2", "2.5", "3", "3.5", "4", "4.5", "5", ">5",
];

#[test]
fn every_table_code_resolves_to_a_distinct_subset() {
    let mut seen = HashSet::new();
    for mw in MW_CODES {
        for logp in LOGP_CODES {
            let subset = FilterBucket::new(mw, logp)
                .resolve()
                .unwrap_or_else(|| panic!("{mw}:{logp} should resolve"));
            assert!(seen.insert(subset.to_string()));
        }
    }
    assert_eq!(seen.len(), 121);
    assert!(seen.contains("AA"));
    assert!(seen.contains("EF"));
    assert!(seen.contains("KK"));
}

#[test]
fn normalized_ids_are_canonical() {
    for raw in ["ZINC1", "ZINC000000000001", "ZINC1 extra", "\tZINC1\n"] {
        let id = ZincId::normalize(raw).unwrap();
        assert_eq!(id.as_str(), "ZINC000000000001");
        assert_eq!(id.as_str().len(), 16);
    }
}

#[test]
fn numeric_sort_matches_lexicographic_for_canonical_ids() {
    let mut ids = ["ZINC30", "ZINC4", "ZINC200", "ZINC1"]
        .iter()
        .map(|raw| ZincId::normalize(raw).unwrap())
        .collect::<Vec<_>>();
    let mut lexicographic = ids.clone();
    lexicographic.sort();
    sort_numeric(&mut ids);
    assert_eq!(ids, lexicographic);
}

#[test]
fn version_and_format_display() {
    assert_eq!(ZincVersion::Zinc15.to_string(), "15");
    assert_eq!(LigandFormat::Sdf.extension(), "sdf");
    assert_eq!(LigandFormat::Smi.extension(), "smi");
}
