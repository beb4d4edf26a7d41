use std::env;
use std::process::ExitCode;
use tracing::{error, Level};
use tracing_subscriber::FmtSubscriber;

use leadscout::config::Settings;
use leadscout::finder::{country_or_default, normalize_categories, LeadRequest, DEFAULT_LIMIT, MAX_LIMIT, MIN_LIMIT};
use leadscout::AppState;

const USAGE: &str = "usage: leadscout-search --city <city> [--category <category>]... [--country <country>] \
[--limit <n>] [--include-with-website] [--no-ai]";

struct Args {
    city: Option<String>,
    country: Option<String>,
    categories: Vec<String>,
    limit: usize,
    include_with_website: bool,
    use_ai: bool,
}

fn parse_args(mut args: impl Iterator<Item = String>) -> Result<Args, String> {
    let mut parsed = Args {
        city: None,
        country: None,
        categories: Vec::new(),
        limit: DEFAULT_LIMIT,
        include_with_website: false,
        use_ai: true,
    };

    while let Some(arg) = args.next() {
        let mut value = |flag: &str| args.next().ok_or_else(|| format!("{} needs a value", flag));
        match arg.as_str() {
            "--city" => parsed.city = Some(value("--city")?),
            "--country" => parsed.country = Some(value("--country")?),
            "--category" => parsed.categories.push(value("--category")?),
            "--limit" => {
                let raw = value("--limit")?;
                parsed.limit = raw.parse().map_err(|_| format!("--limit must be an integer, got '{}'", raw))?;
            }
            "--include-with-website" => parsed.include_with_website = true,
            "--no-ai" => parsed.use_ai = false,
            other => return Err(format!("unknown argument '{}'", other)),
        }
    }

    if !(MIN_LIMIT..=MAX_LIMIT).contains(&parsed.limit) {
        return Err(format!("--limit must be between {} and {}", MIN_LIMIT, MAX_LIMIT));
    }
    Ok(parsed)
}

#[tokio::main]
async fn main() -> ExitCode {
    // Logs go to stderr so stdout stays valid JSON
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_writer(std::io::stderr)
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);

    let args = match parse_args(env::args().skip(1)) {
        Ok(args) => args,
        Err(e) => {
            eprintln!("{}\n{}", e, USAGE);
            return ExitCode::from(2);
        }
    };
    let Some(city) = args.city.filter(|c| !c.trim().is_empty()) else {
        eprintln!("--city is required\n{}", USAGE);
        return ExitCode::from(2);
    };

    let state = match Settings::from_env().and_then(|settings| AppState::from_settings(&settings)) {
        Ok(state) => state,
        Err(e) => {
            error!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    let request = LeadRequest {
        city: city.trim().to_string(),
        country: country_or_default(args.country.as_deref()),
        categories: normalize_categories(&args.categories, &state.finder.policy().default_category),
        limit: args.limit,
        include_with_website: args.include_with_website,
        use_ai: args.use_ai,
    };

    let leads = state.finder.find_leads(&request).await;
    match serde_json::to_string_pretty(&leads) {
        Ok(json) => {
            println!("{}", json);
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(?e, "failed to serialize leads");
            ExitCode::FAILURE
        }
    }
}
