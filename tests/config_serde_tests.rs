use chart_sync::SyncError;
use chart_sync::api::{ChartStateConfig, MultigraphConfig, SyncPoolConfig};
use chart_sync::core::{BoundCalculator, SelectionBounds, SeriesColor, SeriesSpec};
use chart_sync::interaction::TooltipSyncMode;

#[test]
fn pool_config_fills_missing_fields_with_defaults() {
    let config = SyncPoolConfig::from_json_str("{}").expect("empty config");

    assert_eq!(config, SyncPoolConfig::default());
    assert!(config.sync_bounds);
    assert_eq!(config.sync_tooltips, TooltipSyncMode::Always);
    assert!(!config.sync_drag_state);
}

#[test]
fn pool_config_accepts_host_tooltip_flags() {
    let off = SyncPoolConfig::from_json_str(r#"{"syncTooltips": false}"#).expect("flag");
    let on_shift =
        SyncPoolConfig::from_json_str(r#"{"syncTooltips": "onShift", "syncDragState": true}"#)
            .expect("name");

    assert_eq!(off.sync_tooltips, TooltipSyncMode::Off);
    assert_eq!(on_shift.sync_tooltips, TooltipSyncMode::OnShift);
    assert!(on_shift.sync_drag_state);
}

#[test]
fn unknown_tooltip_mode_is_a_config_error() {
    let err = SyncPoolConfig::from_json_str(r#"{"syncTooltips": "sometimes"}"#)
        .expect_err("unknown mode");

    assert!(matches!(err, SyncError::InvalidConfig(_)));
}

#[test]
fn pool_config_json_is_stable() {
    let config = SyncPoolConfig::default()
        .with_sync_bounds(false)
        .with_sync_tooltips(TooltipSyncMode::OnShift);

    let json = config.to_json_pretty().expect("serialize");
    assert!(json.contains("\"syncTooltips\": \"onShift\""));
    assert_eq!(SyncPoolConfig::from_json_str(&json).expect("parse"), config);
}

#[test]
fn multigraph_config_validates_after_parsing() {
    let parsed = MultigraphConfig::from_json_str(
        r#"{"id": "ops", "syncTooltips": true, "chart": {"defaultBoundCalculator": {"kind": "lastHour"}}}"#,
    )
    .expect("valid config");

    assert_eq!(parsed.id.as_deref(), Some("ops"));
    assert_eq!(
        parsed.chart,
        ChartStateConfig::default().with_default_bound_calculator(BoundCalculator::LastHour)
    );
    assert!(parsed.pool_config().sync_drag_state);

    let err = MultigraphConfig::from_json_str(r#"{"id": "a-b"}"#).expect_err("dash in id");
    assert!(matches!(err, SyncError::InvalidConfig(_)));
}

#[test]
fn selection_bounds_serialize_with_kind_tag() {
    let selection = SelectionBounds::new(1.0, 2.0).expect("valid selection");
    let calculator = BoundCalculator::Selection(selection);

    let json = serde_json::to_value(&calculator).expect("serialize");
    assert_eq!(json["kind"], "selection");
    assert_eq!(json["min_x"], 1.0);

    let custom: BoundCalculator =
        serde_json::from_str(r#"{"kind": "custom", "label": "lastWeek"}"#).expect("custom");
    assert_eq!(custom.label(), "lastWeek");
}

#[test]
fn series_specs_accept_host_shapes() {
    let series: Vec<SeriesSpec> = serde_json::from_str(
        r##"[
            {"key": "cpu", "name": "CPU", "color": "#ff0000"},
            {"key": "mem", "yKey": "rss", "color": 3, "graph": 1}
        ]"##,
    )
    .expect("series list");

    assert_eq!(
        series[0].color,
        Some(SeriesColor::Named("#ff0000".to_owned()))
    );
    assert_eq!(series[1].y_key.as_deref(), Some("rss"));
    assert_eq!(series[1].color, Some(SeriesColor::Palette(3)));
    assert_eq!(series[1].graph, Some(1));
}
