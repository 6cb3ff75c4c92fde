use common::config::Config;
use common::error::PipelineError;
use pipeline::cli::{run_command, Command};
use pipeline::{jobs, output};
use std::path::Path;

const SENTIMENT_CSV: &str = "\
timestamp,value,classification,date
1733097600,25,Fear,2024-12-02
1733184000,80,Greed,2024-12-03
1733184000,81,Greed,2024-12-03
";

const TRADES_CSV: &str = "\
Account,Coin,Execution Price,Size USD,Side,Timestamp IST,Closed PnL,Leverage
0xa,BTC,97000,100,BUY,02-12-2024 10:00,10,2
0xa,BTC,97100,100,SELL,02-12-2024 11:00,-5,2
0xa,BTC,97200,100,BUY,02-12-2024 12:00,3,2
0xb,ETH,3600,50,SELL,03-12-2024 09:00,0,5
0xb,ETH,3650,50,SELL,04-12-2024 09:00,7,5
,ETH,3650,50,SELL,04-12-2024 09:30,7,5
0xc,ETH,3650,50,SELL,not a time,7,5
";

fn config_for(dir: &Path, trades_csv: &str) -> Config {
    let sentiment = dir.join("fear_greed_index.csv");
    let trades = dir.join("historical_data.csv");
    std::fs::write(&sentiment, SENTIMENT_CSV).unwrap();
    std::fs::write(&trades, trades_csv).unwrap();

    let toml = format!(
        r#"
[general]
log_level = "debug"

[paths]
sentiment_csv = '{}'
trades_csv = '{}'
output_dir = '{}'
"#,
        sentiment.display(),
        trades.display(),
        dir.join("outputs").display(),
    );
    Config::from_toml_str(&toml).unwrap()
}

#[test]
fn test_build_features_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = config_for(dir.path(), TRADES_CSV);

    let rows = jobs::build_features(&cfg).unwrap();
    let keys: Vec<(String, &str)> = rows
        .iter()
        .map(|r| (r.date.to_string(), r.account.as_str()))
        .collect();
    assert_eq!(
        keys,
        vec![
            ("2024-12-02".to_string(), "0xa"),
            ("2024-12-03".to_string(), "0xb"),
            ("2024-12-04".to_string(), "0xb"),
        ]
    );

    let a = &rows[0];
    assert!((a.total_pnl - 8.0).abs() < 1e-9);
    assert!((a.total_volume - 300.0).abs() < 1e-9);
    assert_eq!(a.trade_count, 3);
    assert!((a.win_rate - 200.0 / 3.0).abs() < 1e-9);
    assert!((a.long_pct - 200.0 / 3.0).abs() < 1e-9);
    assert!((a.max_drawdown + 5.0).abs() < 1e-9);
    assert_eq!(a.classification, "Fear");
    assert!((a.sentiment_score - 25.0).abs() < 1e-9);

    // Duplicate sentiment day keeps its first row; the next day is forward-filled.
    assert_eq!(rows[1].classification, "Greed");
    assert!((rows[1].sentiment_score - 80.0).abs() < 1e-9);
    assert_eq!(rows[2].classification, "Greed");
    assert!((rows[2].sentiment_score - 80.0).abs() < 1e-9);

    for r in &rows {
        assert!((0.0..=100.0).contains(&r.win_rate));
        assert!((0.0..=100.0).contains(&r.long_pct));
        assert!(r.max_drawdown <= 0.0);
    }
}

#[test]
fn test_all_command_writes_every_artifact() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = config_for(dir.path(), TRADES_CSV);

    run_command(&cfg, Command::All).unwrap();

    let features = output::read_features(&cfg.paths.final_features()).unwrap();
    assert_eq!(features.len(), 3);

    let segments = std::fs::read_to_string(cfg.paths.segments()).unwrap();
    let mut lines = segments.lines();
    assert_eq!(
        lines.next(),
        Some("account,total_pnl,avg_leverage,trade_count,win_rate,leverage_segment,frequency_segment,performance_segment")
    );
    assert_eq!(lines.count(), 2);

    for name in ["pnl_by_sentiment.svg", "behavior_changes.svg"] {
        let svg = std::fs::read_to_string(cfg.paths.charts_dir().join(name)).unwrap();
        assert!(svg.starts_with("<svg"));
        assert!(svg.contains("Fear"));
    }
}

#[test]
fn test_clean_command_writes_intermediates() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = config_for(dir.path(), TRADES_CSV);

    run_command(&cfg, Command::Clean).unwrap();

    let sentiment = std::fs::read_to_string(cfg.paths.cleaned_sentiment()).unwrap();
    assert_eq!(sentiment.lines().count(), 4);
    let trades = std::fs::read_to_string(cfg.paths.cleaned_trades()).unwrap();
    assert_eq!(trades.lines().count(), 8);
}

#[test]
fn test_segments_without_features_file_fails() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = config_for(dir.path(), TRADES_CSV);
    assert!(run_command(&cfg, Command::Segments).is_err());
}

#[test]
fn test_missing_timestamp_column_is_terminal() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = config_for(dir.path(), "Account,Closed PnL\n0xa,1\n");

    let err = jobs::build_features(&cfg).unwrap_err();
    assert!(format!("{err:#}").contains("no Timestamp column found in trader data"));
    assert!(!cfg.paths.final_features().exists());
}

#[test]
fn test_trades_without_any_parseable_timestamp_fail_before_writing() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = config_for(
        dir.path(),
        "Account,Timestamp IST,Closed PnL\n0xa,not a time,1\n0xb,,2\n",
    );

    let err = jobs::run_features_job(&cfg).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<PipelineError>(),
        Some(PipelineError::EmptyInput { dataset: "trader" })
    ));
    assert!(!cfg.paths.final_features().exists());
}
