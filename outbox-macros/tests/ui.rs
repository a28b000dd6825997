#[test]
fn ui_pass() {
    let t = trybuild::TestCases::new();
    t.pass("tests/ui/aggregate_basic.rs");
    t.pass("tests/ui/aggregate_custom_id.rs");
    t.pass("tests/ui/domain_event_basic.rs");
}
