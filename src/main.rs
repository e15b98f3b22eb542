use std::env;
use std::fs;
use std::process;

use treelines::api;

fn main() {
    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        eprintln!("Usage: {} <stage.json> [options]", args[0]);
        eprintln!();
        eprintln!("Options:");
        eprintln!("  -o, --output <file>  Output file (default: stdout)");
        eprintln!("  -m, --mode <mode>    Tree mode: manual, tree, genealogy");
        eprintln!("      --fix            Run the position fixer before emitting lines");
        eprintln!("      --validate       Emit a stage validity report instead of lines");
        process::exit(1);
    }

    let input_path = &args[1];
    let mut output_path: Option<String> = None;
    let mut mode: Option<String> = None;
    let mut fix = false;
    let mut validate = false;

    let mut i = 2;
    while i < args.len() {
        match args[i].as_str() {
            "-o" | "--output" => {
                i += 1;
                if i < args.len() {
                    output_path = Some(args[i].clone());
                }
            }
            "-m" | "--mode" => {
                i += 1;
                if i < args.len() {
                    mode = Some(args[i].clone());
                }
            }
            "--fix" => fix = true,
            "--validate" => validate = true,
            _ => {
                eprintln!("Unknown option: {}", args[i]);
                process::exit(1);
            }
        }
        i += 1;
    }

    let mut stage = match fs::read_to_string(input_path) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Failed to read {}: {}", input_path, e);
            process::exit(1);
        }
    };

    // A mode flag overrides whatever the document carries.
    if let Some(mode) = mode {
        let mut doc: serde_json::Value = match serde_json::from_str(&stage) {
            Ok(v) => v,
            Err(e) => {
                eprintln!("Invalid stage document: {}", e);
                process::exit(1);
            }
        };
        doc["mode"] = serde_json::Value::String(mode);
        stage = doc.to_string();
    }

    let result = if validate {
        api::check_stage_validity_json(&stage)
    } else if fix {
        api::fix_positions_json(&stage)
    } else {
        api::compute_lines_json(&stage)
    };

    let output = match result {
        Ok(s) => s,
        Err(e) => {
            eprintln!("{}", e);
            process::exit(1);
        }
    };

    match output_path {
        Some(path) => {
            if let Err(e) = fs::write(&path, &output) {
                eprintln!("Failed to write {}: {}", path, e);
                process::exit(1);
            }
        }
        None => println!("{}", output),
    }
}
