// Proptest configuration shared by the property tests.
//
// Env knobs:
// - PROPTEST_CASES: number of cases per property (default 32).

pub fn proptest_prelude_config() -> proptest::prelude::ProptestConfig {
    let base = proptest::prelude::ProptestConfig::default();
    let cases = std::env::var("PROPTEST_CASES")
        .ok()
        .and_then(|s| s.parse::<u32>().ok())
        .unwrap_or(32)
        .max(1);

    proptest::prelude::ProptestConfig {
        // No regression files from integration tests
        failure_persistence: None,
        cases,
        ..base
    }
}
