use std::collections::BTreeMap;
use std::net::SocketAddr;

use axum::{
    Router,
    extract::Json,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use clap::Parser;
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::core::{
    CUSTOM_INDEX, ConfigOverrides, ContributionSchedule, Contributions, CurrentOverrides,
    FutureOverrides, InflationTable, JOINT, OldOverrides, RegimeConfigs, ReturnLibrary,
    ReturnSeries, SimulationError, SimulationResult, build_contribution_schedule_for_years,
    get_default_configs, run_simulation,
};

#[derive(Parser, Debug)]
#[command(
    name = "box3",
    about = "Compare wealth and tax trajectories under four Dutch box 3 regimes"
)]
struct Cli {
    #[arg(long, default_value_t = 100_000.0)]
    start_capital: f64,
    #[arg(
        long = "returns",
        value_name = "YEAR:PCT",
        help = "Annual return in percent, repeat per year, e.g. --returns 2008:-37.0"
    )]
    returns: Vec<String>,
    #[arg(long, help = "First year to simulate, defaults to the first return year")]
    start_year: Option<i32>,
    #[arg(long, help = "Last year to simulate, defaults to the last return year")]
    end_year: Option<i32>,
    #[arg(long, default_value_t = 0.0, help = "Monthly deposit in the first year")]
    monthly_contribution: f64,
    #[arg(long, help = "Grow the monthly deposit with inflation each year")]
    index_contributions: bool,
    #[arg(
        long = "inflation",
        value_name = "YEAR:PCT",
        help = "Inflation in percent used for indexed deposits"
    )]
    inflation: Vec<String>,
    #[arg(
        long = "contribution",
        value_name = "YEAR:AMOUNT",
        help = "Explicit monthly deposit for a year; replaces the generated schedule"
    )]
    contributions_by_year: Vec<String>,
    #[arg(long, help = "Fiscal partner: doubles exemptions and thresholds")]
    partner: bool,
    #[arg(long)]
    old_exemption: Option<f64>,
    #[arg(long)]
    old_deemed_return_rate: Option<f64>,
    #[arg(long)]
    old_tax_rate: Option<f64>,
    #[arg(long)]
    current_savings_weight: Option<f64>,
    #[arg(long)]
    current_invest_weight: Option<f64>,
    #[arg(long)]
    current_debt_weight: Option<f64>,
    #[arg(long)]
    current_savings_rate: Option<f64>,
    #[arg(long)]
    current_invest_rate: Option<f64>,
    #[arg(long)]
    current_debt_rate: Option<f64>,
    #[arg(long)]
    current_exemption: Option<f64>,
    #[arg(long)]
    current_debt_threshold: Option<f64>,
    #[arg(long)]
    current_tax_rate: Option<f64>,
    #[arg(long)]
    future_free_return: Option<f64>,
    #[arg(long)]
    future_tax_rate: Option<f64>,
    #[arg(long)]
    future_loss_threshold: Option<f64>,
    #[arg(long, help = "Pretty-print the JSON result")]
    pretty: bool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct SimulatePayload {
    start_capital: Option<f64>,
    returns: Option<BTreeMap<i32, f64>>,
    start_year: Option<i32>,
    end_year: Option<i32>,
    monthly_contribution: Option<f64>,
    index_contributions: Option<bool>,
    inflation: Option<BTreeMap<i32, f64>>,
    contributions_by_year: Option<BTreeMap<i32, f64>>,
    partner: Option<bool>,
    configs: Option<ConfigOverrides>,
}

/// Unvalidated request shared by the CLI and the HTTP payload.
#[derive(Debug, Default)]
struct RequestDraft {
    start_capital: f64,
    returns: BTreeMap<i32, f64>,
    start_year: Option<i32>,
    end_year: Option<i32>,
    monthly_contribution: f64,
    index_contributions: bool,
    inflation: BTreeMap<i32, f64>,
    contributions_by_year: Option<BTreeMap<i32, f64>>,
    partner: bool,
    overrides: ConfigOverrides,
}

#[derive(Debug)]
pub struct SimulationRequest {
    pub start_capital: f64,
    pub returns: ReturnSeries,
    pub configs: RegimeConfigs,
    pub contributions: Contributions,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SimulateResponse {
    configs: RegimeConfigs,
    monthly_contributions: BTreeMap<i32, f64>,
    #[serde(flatten)]
    result: SimulationResult,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

impl TryFrom<Cli> for RequestDraft {
    type Error = SimulationError;

    fn try_from(cli: Cli) -> Result<Self, Self::Error> {
        let contributions_by_year = if cli.contributions_by_year.is_empty() {
            None
        } else {
            Some(parse_year_entries(&cli.contributions_by_year)?)
        };

        Ok(RequestDraft {
            start_capital: cli.start_capital,
            returns: parse_year_entries(&cli.returns)?,
            start_year: cli.start_year,
            end_year: cli.end_year,
            monthly_contribution: cli.monthly_contribution,
            index_contributions: cli.index_contributions,
            inflation: parse_year_entries(&cli.inflation)?,
            contributions_by_year,
            partner: cli.partner,
            overrides: ConfigOverrides {
                old: OldOverrides {
                    exemption: cli.old_exemption,
                    deemed_return_rate: cli.old_deemed_return_rate,
                    tax_rate: cli.old_tax_rate,
                    ..OldOverrides::default()
                },
                current: CurrentOverrides {
                    savings_weight: cli.current_savings_weight,
                    invest_weight: cli.current_invest_weight,
                    debt_weight: cli.current_debt_weight,
                    savings_rate: cli.current_savings_rate,
                    invest_rate: cli.current_invest_rate,
                    debt_rate: cli.current_debt_rate,
                    exemption: cli.current_exemption,
                    debt_threshold: cli.current_debt_threshold,
                    tax_rate: cli.current_tax_rate,
                    ..CurrentOverrides::default()
                },
                future: FutureOverrides {
                    free_return: cli.future_free_return,
                    tax_rate: cli.future_tax_rate,
                    loss_threshold: cli.future_loss_threshold,
                    ..FutureOverrides::default()
                },
                ..ConfigOverrides::default()
            },
        })
    }
}

impl From<SimulatePayload> for RequestDraft {
    fn from(payload: SimulatePayload) -> Self {
        let defaults = default_draft();
        RequestDraft {
            start_capital: payload.start_capital.unwrap_or(defaults.start_capital),
            returns: payload.returns.unwrap_or_default(),
            start_year: payload.start_year,
            end_year: payload.end_year,
            monthly_contribution: payload
                .monthly_contribution
                .unwrap_or(defaults.monthly_contribution),
            index_contributions: payload.index_contributions.unwrap_or(false),
            inflation: payload.inflation.unwrap_or_default(),
            contributions_by_year: payload.contributions_by_year,
            partner: payload.partner.unwrap_or(false),
            overrides: payload.configs.unwrap_or_default(),
        }
    }
}

fn default_draft() -> RequestDraft {
    RequestDraft {
        start_capital: 100_000.0,
        ..RequestDraft::default()
    }
}

fn parse_year_entries(entries: &[String]) -> Result<BTreeMap<i32, f64>, SimulationError> {
    let mut parsed = BTreeMap::new();
    for entry in entries {
        let invalid = || SimulationError::InvalidYearEntry {
            entry: entry.clone(),
        };
        let (year, value) = entry.split_once(':').ok_or_else(invalid)?;
        let year = year.trim().parse::<i32>().map_err(|_| invalid())?;
        let value = value.trim().parse::<f64>().map_err(|_| invalid())?;
        if parsed.insert(year, value).is_some() {
            return Err(SimulationError::DuplicateYear { year });
        }
    }
    Ok(parsed)
}

fn build_request(draft: RequestDraft) -> Result<SimulationRequest, SimulationError> {
    let library = ReturnLibrary::with_custom(draft.returns);
    let returns = match library.year_range(CUSTOM_INDEX) {
        Some((first, last)) => library.require(
            CUSTOM_INDEX,
            draft.start_year.unwrap_or(first),
            draft.end_year.unwrap_or(last),
        )?,
        None => ReturnSeries::default(),
    };

    let base = if draft.partner {
        get_default_configs().with_partner_multiplier(JOINT)
    } else {
        get_default_configs()
    };
    let configs = draft.overrides.apply(base);

    if !draft.start_capital.is_finite() || draft.start_capital < 0.0 {
        warn!(
            start_capital = draft.start_capital,
            "start capital clamped to zero"
        );
    }

    let contributions = match draft.contributions_by_year {
        Some(by_year) => Contributions::from(ContributionSchedule::new(by_year)),
        None if returns.is_empty() => Contributions::Flat(draft.monthly_contribution),
        None => Contributions::from(build_contribution_schedule_for_years(
            draft.monthly_contribution,
            &returns.years(),
            draft.index_contributions,
            &InflationTable::new(draft.inflation),
        )),
    };

    Ok(SimulationRequest {
        start_capital: draft.start_capital,
        returns,
        configs,
        contributions,
    })
}

pub fn execute(request: &SimulationRequest) -> SimulationResult {
    run_simulation(
        request.start_capital,
        &request.returns,
        &request.configs,
        &request.contributions,
    )
}

fn build_simulate_response(request: &SimulationRequest, result: SimulationResult) -> SimulateResponse {
    let monthly_contributions = result
        .years
        .iter()
        .map(|&year| (year, request.contributions.monthly_for(year)))
        .collect();
    SimulateResponse {
        configs: request.configs,
        monthly_contributions,
        result,
    }
}

/// Runs one simulation from command-line arguments and returns the JSON result.
pub fn run_cli(args: Vec<String>) -> Result<String, SimulationError> {
    let cli = Cli::parse_from(args);
    let pretty = cli.pretty;
    let request = build_request(RequestDraft::try_from(cli)?)?;
    let response = build_simulate_response(&request, execute(&request));
    render_json(&response, pretty)
}

fn render_json<T: Serialize>(body: &T, pretty: bool) -> Result<String, SimulationError> {
    let json = if pretty {
        serde_json::to_string_pretty(body)
    } else {
        serde_json::to_string(body)
    };
    json.map_err(|e| SimulationError::Serialization {
        message: e.to_string(),
    })
}

pub async fn run_http_server(port: u16) -> std::io::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let app = Router::new()
        .route("/api/defaults", get(defaults_handler))
        .route("/api/simulate", post(simulate_handler))
        .fallback(not_found_handler);

    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "box3 HTTP API listening");

    axum::serve(listener, app).await
}

async fn defaults_handler() -> Response {
    json_response(StatusCode::OK, get_default_configs())
}

async fn not_found_handler() -> Response {
    error_response(StatusCode::NOT_FOUND, "Not found")
}

async fn simulate_handler(Json(payload): Json<SimulatePayload>) -> Response {
    let request = match build_request(payload.into()) {
        Ok(request) => request,
        Err(err) => {
            warn!(error = %err, "rejected simulate request");
            return error_response(StatusCode::BAD_REQUEST, &err.to_string());
        }
    };

    let result = execute(&request);
    json_response(StatusCode::OK, build_simulate_response(&request, result))
}

fn json_response<T: Serialize>(status: StatusCode, body: T) -> Response {
    let mut response = (status, Json(body)).into_response();
    response.headers_mut().insert(
        header::CACHE_CONTROL,
        header::HeaderValue::from_static("no-store"),
    );
    response
}

fn error_response(status: StatusCode, msg: &str) -> Response {
    json_response(
        status,
        ErrorResponse {
            error: msg.to_string(),
        },
    )
}

#[cfg(test)]
fn api_request_from_json(json: &str) -> Result<SimulationRequest, String> {
    let payload = serde_json::from_str::<SimulatePayload>(json)
        .map_err(|e| format!("Invalid API JSON payload: {e}"))?;
    build_request(payload.into()).map_err(|e| e.to_string())
}
