use anyhow::{Context, Result};
use chrono::Utc;
use rust_decimal::Decimal;
use std::time::Instant;

use crate::config::AppConfig;
use crate::db::{parse_decimal, Database};
use crate::engine::boundary::within_transaction;
use crate::engine::{evaluate_quota, evaluate_transaction};
use crate::models::{
    CounterKind, LimitCheckRequest, OrderLimit, SpendLimit, TransactionRecord, TypeLimit,
};

const DEFAULT_LIST_LIMIT: u32 = 20;

pub(crate) fn as_cli(args: &[String], db: &mut Database, config: &AppConfig) -> Result<()> {
    match args[1].as_str() {
        "spend-limit" => cli_spend_limit(&args[2..], db),
        "limits" => cli_limits(db),
        "type-limit" => cli_type_limit(&args[2..], db),
        "order-limit" => cli_order_limit(&args[2..], db),
        "check-transaction" => cli_check_transaction(&args[2..], db, config),
        "check-limit" => cli_check_limit(&args[2..], db, config),
        "breaches" => cli_breaches(&args[2..], db),
        "history" => cli_history(&args[2..], db),
        "transactions" => cli_transactions(&args[2..], db),
        "migrate" => {
            println!("Schema version: {}", db.schema_version()?);
            Ok(())
        }
        "--help" | "-h" | "help" => {
            print_usage();
            Ok(())
        }
        "--version" | "-V" | "version" => {
            println!("limitguard {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        other => {
            print_usage();
            anyhow::bail!("Unknown command: {other}");
        }
    }
}

fn print_usage() {
    println!("limitguard - transaction spend and quota limit service");
    println!();
    println!("Usage: limitguard [command]");
    println!();
    println!("Commands:");
    println!("  (none)                                   Serve the HTTP API");
    println!("  spend-limit <category> <mcc> <amount>    Create or replace a spend ceiling");
    println!("    --day <N> --hour <N> --minute <N>      Count ceilings (default: 0)");
    println!("  limits                                   List spend ceilings");
    println!("  type-limit <code> <category>             Create a quota family");
    println!("  order-limit <type> <order> <counter> <amount>");
    println!("                                           Add a quota line (VALUE, QUANTITY, MINUTE)");
    println!("  check-transaction <json>                 Evaluate a card transaction");
    println!("  check-limit <json>                       Evaluate a quota request");
    println!("  breaches [--limit <N>]                   Show recent spend breaches");
    println!("  history <key> [--limit <N>]              Show quota verdicts for a key");
    println!("  transactions <card>                      Show recorded card transactions");
    println!("  migrate                                  Apply schema migrations");
    println!("  --help, -h                               Show this help");
    println!("  --version, -V                            Show version");
}

fn flag_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.windows(2)
        .find(|w| w[0] == flag)
        .map(|w| w[1].as_str())
}

fn count_flag(args: &[String], flag: &str) -> Result<i64> {
    match flag_value(args, flag) {
        Some(raw) => raw
            .parse()
            .with_context(|| format!("Invalid value for {flag}: {raw}")),
        None => Ok(0),
    }
}

fn list_limit(args: &[String]) -> Result<u32> {
    match flag_value(args, "--limit") {
        Some(raw) => raw
            .parse()
            .with_context(|| format!("Invalid value for --limit: {raw}")),
        None => Ok(DEFAULT_LIST_LIMIT),
    }
}

fn parse_amount(raw: &str) -> Result<Decimal> {
    parse_decimal(raw.trim()).with_context(|| format!("Invalid amount: {raw}"))
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

// ── Configuration ─────────────────────────────────────────────

fn cli_spend_limit(args: &[String], db: &mut Database) -> Result<()> {
    if args.len() < 3 {
        anyhow::bail!("Usage: limitguard spend-limit <category> <mcc> <amount> [--day N] [--hour N] [--minute N]");
    }
    let mut limit = SpendLimit::new(args[0].clone(), args[1].clone(), parse_amount(&args[2])?);
    limit.day_count = count_flag(args, "--day")?;
    limit.hour_count = count_flag(args, "--hour")?;
    limit.minute_count = count_flag(args, "--minute")?;
    db.upsert_spend_limit(&limit)?;
    println!(
        "Spend limit {}/{}: amount {} (day {}, hour {}, minute {})",
        limit.category, limit.mcc, limit.amount, limit.day_count, limit.hour_count, limit.minute_count
    );
    Ok(())
}

fn cli_limits(db: &mut Database) -> Result<()> {
    let limits = db.get_spend_limits()?;
    if limits.is_empty() {
        println!("No spend limits configured.");
        return Ok(());
    }
    println!("{:<16} {:<8} {:>14} {:>6} {:>6} {:>6}", "Category", "MCC", "Amount", "Day", "Hour", "Min");
    println!("{}", "─".repeat(62));
    for limit in &limits {
        println!(
            "{:<16} {:<8} {:>14} {:>6} {:>6} {:>6}",
            limit.category, limit.mcc, limit.amount, limit.day_count, limit.hour_count, limit.minute_count
        );
    }
    Ok(())
}

fn cli_type_limit(args: &[String], db: &mut Database) -> Result<()> {
    if args.len() < 2 {
        anyhow::bail!("Usage: limitguard type-limit <code> <category>");
    }
    db.insert_type_limit(&TypeLimit::new(args[0].clone(), args[1].clone()))
        .with_context(|| format!("Failed to create type limit '{}'", args[0]))?;
    println!("Type limit {} ({}) created", args[0], args[1]);
    Ok(())
}

fn cli_order_limit(args: &[String], db: &mut Database) -> Result<()> {
    if args.len() < 4 {
        anyhow::bail!("Usage: limitguard order-limit <type-code> <order-type> <VALUE|QUANTITY|MINUTE> <amount>");
    }
    let counter = CounterKind::parse(&args[2]).ok_or_else(|| {
        let expected: Vec<&str> = CounterKind::all().iter().map(|k| k.as_str()).collect();
        anyhow::anyhow!("Invalid counter '{}': expected one of {}", args[2], expected.join(", "))
    })?;
    let line = OrderLimit::new(args[0].clone(), args[1].clone(), counter, parse_amount(&args[3])?);
    let id = db
        .insert_order_limit(&line)
        .with_context(|| format!("Failed to add order limit to '{}'", args[0]))?;
    println!("Order limit #{id}: {} {} {} {}", line.type_limit, line.order_type, counter, line.amount);
    Ok(())
}

// ── Evaluation ────────────────────────────────────────────────

fn cli_check_transaction(args: &[String], db: &mut Database, config: &AppConfig) -> Result<()> {
    let raw = args
        .first()
        .ok_or_else(|| anyhow::anyhow!("Usage: limitguard check-transaction <json>"))?;
    let txn: TransactionRecord = serde_json::from_str(raw).context("Invalid transaction JSON")?;
    let deadline = Instant::now() + config.request_timeout();
    let now = Utc::now();
    let evaluated = within_transaction(db.connection_mut(), Some(deadline), |store| {
        evaluate_transaction(store, txn, now)
    })?;
    print_json(&evaluated)
}

fn cli_check_limit(args: &[String], db: &mut Database, config: &AppConfig) -> Result<()> {
    let raw = args
        .first()
        .ok_or_else(|| anyhow::anyhow!("Usage: limitguard check-limit <json>"))?;
    let request: LimitCheckRequest = serde_json::from_str(raw).context("Invalid limit request JSON")?;
    let deadline = Instant::now() + config.request_timeout();
    let now = Utc::now();
    let verdicts = within_transaction(db.connection_mut(), Some(deadline), |store| {
        evaluate_quota(store, &request, now)
    })?;
    print_json(&verdicts)
}

// ── History ───────────────────────────────────────────────────

fn cli_breaches(args: &[String], db: &mut Database) -> Result<()> {
    let breaches = db.get_breach_limits(list_limit(args)?)?;
    if breaches.is_empty() {
        println!("No breaches recorded.");
        return Ok(());
    }
    println!("{:<20} {:<8} {:<24} {:>12} {:>6}  Created", "Transaction", "MCC", "Status", "Overage", "Count");
    println!("{}", "─".repeat(96));
    for breach in &breaches {
        println!(
            "{:<20} {:<8} {:<24} {:>12} {:>6}  {}",
            breach.transaction_id,
            breach.mcc,
            breach.status,
            breach.amount,
            breach.count,
            breach.created_at.format("%Y-%m-%d %H:%M:%S"),
        );
    }
    Ok(())
}

fn cli_history(args: &[String], db: &mut Database) -> Result<()> {
    let key = args
        .first()
        .ok_or_else(|| anyhow::anyhow!("Usage: limitguard history <key> [--limit N]"))?;
    let records = db.get_limit_transactions(key, list_limit(args)?)?;
    if records.is_empty() {
        println!("No verdicts recorded for {key}.");
        return Ok(());
    }
    for record in &records {
        println!(
            "{}  {:<12} {:<16} {:<9} {:<24} {:>12}",
            record.created_at.format("%Y-%m-%d %H:%M:%S"),
            record.type_limit,
            record.order_limit,
            record.counter_limit,
            record.status,
            record.amount,
        );
    }
    Ok(())
}

fn cli_transactions(args: &[String], db: &mut Database) -> Result<()> {
    let card = args
        .first()
        .ok_or_else(|| anyhow::anyhow!("Usage: limitguard transactions <card>"))?;
    let txns = db.get_transaction_limits(card)?;
    if txns.is_empty() {
        println!("No transactions recorded for {card}.");
        return Ok(());
    }
    for txn in &txns {
        let at = txn
            .transaction_at
            .map(|at| at.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_default();
        println!(
            "{at}  {:<20} {:<12} {:<8} {:>12} {}",
            txn.transaction_id, txn.category, txn.mcc, txn.amount, txn.status
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use rust_decimal_macros::dec;

    fn args(parts: &[&str]) -> Vec<String> {
        std::iter::once("limitguard")
            .chain(parts.iter().copied())
            .map(String::from)
            .collect()
    }

    fn test_config() -> AppConfig {
        AppConfig {
            port: 0,
            database_path: None,
            pool_max_size: 1,
            ctx_timeout_secs: 5,
            busy_timeout_ms: 1000,
            log_json: false,
            pod_name: "test".into(),
            api_version: "0".into(),
            env: "test".into(),
        }
    }

    #[test]
    fn test_flag_parsing() {
        let a = args(&["breaches", "--limit", "5"]);
        assert_eq!(flag_value(&a, "--limit"), Some("5"));
        assert_eq!(list_limit(&a).unwrap(), 5);
        assert_eq!(list_limit(&args(&["breaches"])).unwrap(), DEFAULT_LIST_LIMIT);
        assert!(count_flag(&args(&["--hour", "x"]), "--hour").is_err());
    }

    #[test]
    fn test_configure_and_evaluate() {
        let mut db = Database::open_in_memory().unwrap();
        let config = test_config();

        as_cli(&args(&["spend-limit", "CREDIT", "5812", "100", "--hour", "5"]), &mut db, &config).unwrap();
        let limits = db.get_spend_limits().unwrap();
        assert_eq!(limits[0].amount, dec!(100));
        assert_eq!(limits[0].hour_count, 5);

        as_cli(&args(&["type-limit", "PIX", "TRANSFER"]), &mut db, &config).unwrap();
        as_cli(&args(&["order-limit", "PIX", "CHANNEL", "value", "500"]), &mut db, &config).unwrap();

        let txn = r#"{"category":"CREDIT","card_number":"4111","transaction_id":"t1","mcc":"5812","amount":150}"#;
        as_cli(&args(&["check-transaction", txn]), &mut db, &config).unwrap();
        assert_eq!(db.get_breach_limits(10).unwrap().len(), 1);

        let request = r#"{"transaction_id":"t2","key":"K","type_limit":"PIX","order_limit":"CHANNEL","amount":10}"#;
        as_cli(&args(&["check-limit", request]), &mut db, &config).unwrap();
        assert_eq!(db.get_limit_transactions("K", 10).unwrap().len(), 1);
    }

    #[test]
    fn test_rejects_bad_input() {
        let mut db = Database::open_in_memory().unwrap();
        let config = test_config();
        assert!(as_cli(&args(&["order-limit", "PIX", "CHANNEL", "HOURLY", "1"]), &mut db, &config).is_err());
        assert!(as_cli(&args(&["spend-limit", "CREDIT", "5812", "ten"]), &mut db, &config).is_err());
        assert!(as_cli(&args(&["check-limit", "{"]), &mut db, &config).is_err());
        assert!(as_cli(&args(&["bogus"]), &mut db, &config).is_err());
    }
}
