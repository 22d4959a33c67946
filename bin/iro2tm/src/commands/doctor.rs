use iro2tm_browser::list_available_engines;
use iro2tm_core::{Config, Paths};

/// Run environment diagnostics: config status and browser availability.
pub async fn run(config_path: Option<&str>) -> anyhow::Result<()> {
    let paths = Paths::new();

    println!();
    println!("🩺 iro2tm doctor — Environment Diagnostics");
    println!("================================");
    println!();

    let mut ok_count = 0u32;
    let mut warn_count = 0u32;
    let mut err_count = 0u32;

    // --- 1. Config ---
    println!("📋 Configuration");
    let config_file = match config_path {
        Some(path) => std::path::PathBuf::from(path),
        None => paths.config_file(),
    };
    if config_file.exists() {
        match Config::load_from(&config_file) {
            Ok(config) => {
                print_ok("Config file loaded", &config_file.display().to_string());
                println!("  Engine: {}", config.browser.engine);
                println!("  Wait mode: {:?}", config.wait_mode);
                ok_count += 1;
            }
            Err(e) => {
                print_err("Config file unreadable", &e.to_string());
                err_count += 1;
            }
        }
    } else {
        print_warn(
            "No config file",
            &format!("defaults in effect ({})", config_file.display()),
        );
        warn_count += 1;
    }
    println!();

    // --- 2. Browsers ---
    println!("🌐 Browsers");
    let engines = list_available_engines();
    if engines.is_empty() {
        print_err(
            "No browser found",
            "Install Chrome, Edge, or Firefox to run conversions",
        );
        err_count += 1;
    } else {
        for (engine, path) in &engines {
            print_ok(engine.name(), path);
            ok_count += 1;
        }
    }
    println!();

    // --- Summary ---
    println!("================================");
    println!(
        "Summary: {} ok, {} warnings, {} errors",
        ok_count, warn_count, err_count
    );
    println!();

    if engines.is_empty() {
        anyhow::bail!("No usable browser engine available");
    }
    Ok(())
}

fn print_ok(label: &str, detail: &str) {
    if detail.is_empty() {
        println!("  ✅ {}", label);
    } else {
        println!("  ✅ {} — {}", label, detail);
    }
}

fn print_warn(label: &str, hint: &str) {
    if hint.is_empty() {
        println!("  ⚠️  {}", label);
    } else {
        println!("  ⚠️  {} — {}", label, hint);
    }
}

fn print_err(label: &str, hint: &str) {
    if hint.is_empty() {
        println!("  ❌ {}", label);
    } else {
        println!("  ❌ {} — {}", label, hint);
    }
}
