// Entry point and high-level CLI flow.
//
// - Option [1] loads the production records and prints load diagnostics.
// - Option [2] builds the configured trend table and exports it.
// - Option [3] builds the grouped (search) report.
// - Option [4] loads the live snapshot and prints the machine rollup.
// After a report the user can go back to the selection menu or exit.
use once_cell::sync::Lazy;
use std::env;
use std::io::{self, Write};
use std::sync::{Mutex, MutexGuard};
use textile_report::config::{AggregationRequest, GroupKeyField, REPORT_FALLBACK_LABEL};
use textile_report::finalizer::FinalizePolicy;
use textile_report::session::ReportSession;
use textile_report::types::TrendTable;
use textile_report::{loader, logging, output, reports, util};
use tracing::{error, info};

const DEFAULT_RECORDS_PATH: &str = "production_records.json";
const DEFAULT_SNAPSHOT_PATH: &str = "live_report.json";

// Loaded records survive across menu iterations so reports can be rebuilt
// without reloading.
static APP_STATE: Lazy<Mutex<ReportSession>> =
    Lazy::new(|| Mutex::new(ReportSession::new(FinalizePolicy::live_trend())));

fn state() -> MutexGuard<'static, ReportSession> {
    APP_STATE.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Trend request from `TEXTILE_REPORT_CONFIG`, or the built-in defaults.
fn trend_request() -> AggregationRequest {
    match env::var("TEXTILE_REPORT_CONFIG") {
        Ok(path) => match AggregationRequest::from_file(&path) {
            Ok(req) => req,
            Err(e) => {
                error!(error = %e, "falling back to default trend request");
                AggregationRequest::default()
            }
        },
        Err(_) => AggregationRequest {
            drill_down: true,
            ..AggregationRequest::default()
        },
    }
}

fn read_choice() -> String {
    print!("Enter choice: ");
    let _ = io::stdout().flush();
    let mut buf = String::new();
    io::stdin().read_line(&mut buf).ok();
    buf.trim().to_string()
}

/// Returns `true` if the user chose `Y`, `false` if they chose `N`.
fn prompt_back_to_menu() -> bool {
    loop {
        print!("Back to Report Selection (Y/N): ");
        let _ = io::stdout().flush();
        let mut buf = String::new();
        io::stdin().read_line(&mut buf).ok();
        match buf.trim().to_uppercase().as_str() {
            "Y" => return true,
            "N" => return false,
            _ => println!("Invalid choice. Please enter Y or N."),
        }
    }
}

fn export_trend(table: &TrendTable, req: &AggregationRequest) {
    let csv_path = "trend_report.csv";
    if let Err(e) = output::write_trend_csv(csv_path, table, req.granularity) {
        eprintln!("Write error: {}", e);
    }
    if let Err(e) = output::write_json("trend_report.json", table) {
        eprintln!("Write error: {}", e);
    }
    println!(
        "Trend: {} by {:?} ({:?})\n",
        req.selected_metric, req.group_key_field, req.granularity
    );
    output::preview_trend(table, req.granularity, 5);
    println!("(Full table exported to {})\n", csv_path);
}

fn handle_load() {
    let path = env_or("TEXTILE_RECORDS", DEFAULT_RECORDS_PATH);
    match loader::load_records(&path) {
        Ok((records, report)) => {
            println!(
                "Processing records... ({} rows read, {} loaded)",
                util::format_int(report.total_rows),
                util::format_int(report.loaded_rows)
            );
            if report.skipped_rows > 0 {
                println!(
                    "Note: {} rows skipped as undecodable.",
                    util::format_int(report.skipped_rows)
                );
            }
            if report.bad_timestamps > 0 {
                println!(
                    "Note: {} rows have no usable shift start time and are left out of trends.",
                    util::format_int(report.bad_timestamps)
                );
            }
            println!();
            let queued = state().load(records);
            for (req, table) in &queued {
                export_trend(table, req);
            }
        }
        Err(e) => {
            eprintln!("Failed to load file: {}\n", e);
        }
    }
}

fn handle_trend() {
    let req = trend_request();
    let table = state().request(req.clone());
    match table {
        Some(table) => export_trend(&table, &req),
        None => println!("No records loaded yet; the trend will run once they are (option 1).\n"),
    }
}

fn handle_grouped_report() {
    let session = state();
    let Some(records) = session.records() else {
        println!("Error: No data loaded. Please load the records first (option 1).\n");
        return;
    };
    let req = trend_request().for_grouped_report();
    let rows = reports::generate_grouped_report(records, &req, &FinalizePolicy::search_report(2));
    let file = "grouped_report.csv";
    if let Err(e) = output::write_csv(file, &rows) {
        eprintln!("Write error: {}", e);
    }
    println!("Grouped Report ({:?}, by {:?})\n", req.metric_group, req.group_key_field);
    output::preview_metric_rows(
        "Label",
        rows.iter().map(|r| (r.label.as_str(), &r.values)),
        5,
    );
    println!("(Full table exported to {})\n", file);
}

fn handle_snapshot() {
    let path = env_or("TEXTILE_SNAPSHOT", DEFAULT_SNAPSHOT_PATH);
    let data = match loader::load_snapshot(&path) {
        Ok(d) => d,
        Err(e) => {
            eprintln!("Failed to load snapshot: {}\n", e);
            return;
        }
    };
    let policy = FinalizePolicy::dashboard();
    let machines = reports::rollup_machines(&data, &policy, REPORT_FALLBACK_LABEL);
    if let Err(e) = output::write_json("machine_rollup.json", &machines) {
        eprintln!("Write error: {}", e);
    }
    println!("Live Snapshot: Machine Rollup\n");
    output::preview_metric_rows(
        "Machine",
        machines
            .iter()
            .map(|m| (m.display_machine_name.as_str(), &m.metrics)),
        10,
    );
    let units = reports::rollup_by(&data, GroupKeyField::Unit, &policy, REPORT_FALLBACK_LABEL);
    println!("Live Snapshot: Unit Rollup\n");
    output::preview_metric_rows("Unit", units.iter().map(|r| (r.label.as_str(), &r.metrics)), 10);
}

fn main() {
    logging::init();
    info!("textile report starting");
    loop {
        println!("Select Report:");
        println!("[1] Load production records");
        println!("[2] Generate Trend Report");
        println!("[3] Generate Grouped Report");
        println!("[4] Live Snapshot Rollup\n");
        match read_choice().as_str() {
            "1" => handle_load(),
            choice @ ("2" | "3" | "4") => {
                println!();
                match choice {
                    "2" => handle_trend(),
                    "3" => handle_grouped_report(),
                    _ => handle_snapshot(),
                }
                if !prompt_back_to_menu() {
                    println!("Exiting the program.");
                    break;
                }
            }
            _ => println!("Invalid choice. Please enter 1 to 4.\n"),
        }
    }
}
