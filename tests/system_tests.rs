use canopy::config::Config;
use canopy::model::System;
use std::path::Path;

fn load_system(fixture: &str) -> anyhow::Result<System> {
    let config = Config::try_from_path(Path::new(fixture))?;
    System::resolve(&config)
}

#[test]
fn ai_chatbot_system_resolves() -> anyhow::Result<()> {
    let system = load_system("./fixtures/ai_chatbot.toml")?;

    assert_eq!(system.patterns.len(), 4);
    assert_eq!(system.servers.len(), 2);

    // 560 visits a day for a year.
    let simple = system.find_pattern("chat_with_simple_bot")?;
    assert!((simple.occurrences() - 365.0 * 560.0).abs() < 1e-3);

    // The RAG base reloads on the first of each month.
    let fill_rag = system.find_pattern("fill_rag")?;
    assert!((fill_rag.occurrences() - 12.0).abs() < 1e-9);

    Ok(())
}

#[test]
fn ai_chatbot_genai_jobs_derive_their_duration() -> anyhow::Result<()> {
    let system = load_system("./fixtures/ai_chatbot.toml")?;

    let simple = system.find_pattern("chat_with_simple_bot")?;
    let chat_job = simple
        .journey
        .jobs()
        .find(|j| j.name == "simple_chat")
        .expect("chat job should exist");

    // 1500 tokens x (8.02e-13 s x 7.2e9 params + 2.23e-2 s)
    let expected = 1500.0 * (8.02e-13 * 7.2e9 + 2.23e-2);
    assert!((chat_job.request_duration.value.seconds() - expected).abs() < 1e-6);

    // 100 kB payload plus 3 bytes per generated token.
    assert!((chat_job.data_download.value.bytes() - (100e3 + 4500.0)).abs() < 1e-6);

    Ok(())
}

#[test]
fn ai_chatbot_demand_splits_between_web_and_gpu() -> anyhow::Result<()> {
    let system = load_system("./fixtures/ai_chatbot.toml")?;
    let demand = system.server_demand();

    let web = demand
        .iter()
        .find(|d| d.server.name == "web_server")
        .unwrap();
    let gpu = demand
        .iter()
        .find(|d| d.server.name == "gpu_server")
        .unwrap();

    // Every chat journey logs in once: (560 + 270 + 170) visits x 365 days.
    assert!((web.requests - 365000.0).abs() < 1e-3);
    // The GPU answers every journey, including the 12 monthly RAG fills.
    assert!((gpu.requests - 365012.0).abs() < 1e-3);

    Ok(())
}

#[test]
fn astrology_operational_patterns_follow_the_calendar() -> anyhow::Result<()> {
    let system = load_system("./fixtures/astrology.toml")?;

    assert_eq!(system.patterns.len(), 6);
    assert_eq!(system.servers.len(), 7);

    // Seven years of daily 09:00 builds, 2024-2030, leap years included.
    let builds = system.find_pattern("jenkins_builds")?;
    assert!((builds.occurrences() - 2557.0).abs() < 1e-9);

    // One initial database download per year.
    let init = system.find_pattern("database_initial_download")?;
    assert!((init.occurrences() - 7.0).abs() < 1e-9);

    // One update on the first of each month, 7 x 12.
    let update = system.find_pattern("database_monthly_update")?;
    assert!((update.occurrences() - 84.0).abs() < 1e-9);

    Ok(())
}

#[test]
fn astrology_growth_preserves_yearly_totals() -> anyhow::Result<()> {
    let system = load_system("./fixtures/astrology.toml")?;

    let main = system.find_pattern("main_usage")?;
    let by_year = main.series.totals_by_year();
    assert_eq!(by_year.len(), 7);
    assert_eq!(by_year[0].0, 2024);
    assert!((by_year[0].1 - 50000.0).abs() < 1e-3);
    assert!((by_year[6].1 - 230000.0).abs() < 1e-3);
    assert!((main.occurrences() - 980000.0).abs() < 1e-2);

    Ok(())
}

#[test]
fn astrology_trials_multiply_journey_data() -> anyhow::Result<()> {
    let system = load_system("./fixtures/astrology.toml")?;

    let main = system.find_pattern("main_usage")?;
    // The result step runs its three jobs five times per occurrence.
    let result_job = main
        .journey
        .jobs()
        .find(|j| j.name == "modeling_result")
        .expect("modeling job should exist");
    assert_eq!(result_job.trials, 5.0);

    Ok(())
}

#[test]
fn paylib_per_user_rates_scale_with_the_population() -> anyhow::Result<()> {
    let system = load_system("./fixtures/paylib.toml")?;

    assert_eq!(system.patterns.len(), 5);

    // 2.8 downloads per user per year across a million Android phones.
    let android = system.find_pattern("android_downloads")?;
    assert!((android.occurrences() - 2.8e6).abs() < 1e-2);

    let ios = system.find_pattern("ios_downloads")?;
    assert!((ios.occurrences() - 2.0e6).abs() < 1e-2);

    // One preprod run for every day of the leap year 2024.
    let preprod = system.find_pattern("preprod_usage")?;
    assert!((preprod.occurrences() - 366.0).abs() < 1e-9);

    Ok(())
}

#[test]
fn paylib_store_and_prod_servers_split_the_demand() -> anyhow::Result<()> {
    let system = load_system("./fixtures/paylib.toml")?;
    let demand = system.server_demand();

    let store = demand
        .iter()
        .find(|d| d.server.name == "store_server")
        .unwrap();
    let prod = demand
        .iter()
        .find(|d| d.server.name == "prod_server")
        .unwrap();

    assert!((store.requests - 4.8e6).abs() < 1e-2);
    // 2.8M x 25 MB Android plus 2M x 32 MB iOS downloads.
    assert!((store.data_download.gigabytes() - 134_000.0).abs() < 1.0);
    // App usage on both platforms lands on prod.
    assert!((prod.requests - 4.0e6).abs() < 1e-2);

    Ok(())
}

#[test]
fn bloom_training_and_inference_resolve() -> anyhow::Result<()> {
    let system = load_system("./fixtures/bloom.toml")?;

    // 119 training days launched at 08:00.
    let training = system.find_pattern("model_training")?;
    assert!((training.occurrences() - 119.0).abs() < 1e-9);

    // 558 requests an hour, every hour bucket of the span.
    let discussions = system.find_pattern("discussions")?;
    assert!((discussions.occurrences() - 8761.0 * 558.0).abs() < 1e-3);
    assert!((discussions.series.values()[0] - 558.0).abs() < 1e-9);

    Ok(())
}

#[test]
fn bloom_training_moves_a_terabyte_a_day() -> anyhow::Result<()> {
    let system = load_system("./fixtures/bloom.toml")?;
    let demand = system.server_demand();

    let training = demand
        .iter()
        .find(|d| d.server.name == "training_cluster")
        .unwrap();
    assert!((training.data_download.gigabytes() - 119_000.0).abs() < 1e-3);
    // The cluster is busy 24 hours per training day.
    assert!((training.busy_time.hours() - 119.0 * 24.0).abs() < 1e-6);

    Ok(())
}

#[test]
fn assumptions_inventory_cites_the_studies() -> anyhow::Result<()> {
    let system = load_system("./fixtures/bloom.toml")?;
    let assumptions = system.assumptions();

    let cluster_fabrication = assumptions
        .iter()
        .find(|a| a.owner == "server training_cluster" && a.label.contains("chassis"))
        .expect("cluster fabrication assumption should be listed");
    assert_eq!(
        cluster_fabrication.source,
        "Estimating the Carbon Footprint of BLOOM"
    );

    // Defaults carry their provenance too.
    assert!(assumptions
        .iter()
        .any(|a| a.owner == "storage cluster_ssd" && a.source.contains("SSD")));

    Ok(())
}
