mod config;

use std::collections::HashMap;
use std::sync::Mutex;

use actix_cors::Cors;
use actix_web::{App, HttpResponse, HttpServer, Responder, get, middleware, post, put, web};
use log::info;
use serde::{Deserialize, Serialize};

use markov_core::io::{CORPUS_EXTENSION, list_files, load_corpus, tokenize, tokenize_lines};
use markov_core::{Chain, ChainError, Generator, ScriptedDraws};

use crate::config::ServerConfig;

/// Query parameters of `/v1/generate`.
#[derive(Deserialize)]
struct GenerateParams {
	model: String,
	max_tokens: Option<usize>,
	/// Whitespace-separated starting state; the initial state when absent.
	seed: Option<String>,
	/// Comma-separated draws replayed instead of a random source.
	draws: Option<String>,
}

/// Query parameters of `/v1/probability`.
#[derive(Deserialize)]
struct ProbabilityParams {
	model: String,
	next: String,
	/// Whitespace-separated current state.
	current: String,
}

#[derive(Serialize)]
struct ProbabilityResponse {
	probability: f64,
}

#[derive(Deserialize)]
struct ModelQuery {
	names: Option<String>,
	order: Option<usize>,
}

#[derive(Deserialize)]
struct TrainQuery {
	model: String,
	order: Option<usize>,
}

#[derive(Serialize)]
struct TrainResponse {
	sequences: usize,
	states: usize,
	vocabulary: usize,
}

struct SharedData {
	config: ServerConfig,
	chains: HashMap<String, Chain>,
}

impl SharedData {
	fn new(config: ServerConfig) -> Self {
		Self { config, chains: HashMap::new() }
	}
}

impl GenerateParams {
	fn seed_tokens(&self) -> Option<Vec<String>> {
		self.seed.as_deref().map(tokenize)
	}

	fn scripted_draws(&self) -> Result<Option<ScriptedDraws>, String> {
		let Some(draws) = &self.draws else {
			return Ok(None);
		};
		let values = draws
			.split(',')
			.map(str::trim)
			.filter(|s| !s.is_empty())
			.map(|s| s.parse::<u64>().map_err(|_| format!("Invalid draw: {s}")))
			.collect::<Result<Vec<u64>, String>>()?;
		Ok(Some(ScriptedDraws::new(values)))
	}
}

fn chain_error_response(e: ChainError) -> HttpResponse {
	HttpResponse::BadRequest().body(e.to_string())
}

fn lock_failed() -> HttpResponse {
	HttpResponse::InternalServerError().body("Model lock failed")
}

/// HTTP GET endpoint `/v1/generate`
///
/// Walks the named chain and returns the generated sentence as the body.
#[get("/v1/generate")]
async fn get_generated(data: web::Data<Mutex<SharedData>>, query: web::Query<GenerateParams>) -> impl Responder {
	let draws = match query.scripted_draws() {
		Ok(d) => d,
		Err(e) => return HttpResponse::BadRequest().body(e),
	};

	let shared_data = match data.lock() {
		Ok(m) => m,
		Err(_) => return lock_failed(),
	};

	let Some(chain) = shared_data.chains.get(&query.model) else {
		return HttpResponse::NotFound().body(format!("Model {} not loaded", query.model));
	};

	// 0 would lift the cap entirely
	let cap = shared_data.config.max_tokens;
	let max_tokens = match query.max_tokens {
		Some(n) if n > 0 => n.min(cap),
		_ => cap,
	};
	let generator = Generator::new(chain).max_tokens(max_tokens);
	let seed = query.seed_tokens();

	let result = match draws {
		Some(mut draws) => generator.sentence(seed.as_deref(), &mut draws),
		None => generator.sentence(seed.as_deref(), &mut rand::rng()),
	};

	match result {
		Ok(sentence) => HttpResponse::Ok().body(sentence),
		Err(e) => chain_error_response(e),
	}
}

/// HTTP GET endpoint `/v1/probability`
///
/// Returns `{"probability": p}` for `next` following `current`.
#[get("/v1/probability")]
async fn get_probability(data: web::Data<Mutex<SharedData>>, query: web::Query<ProbabilityParams>) -> impl Responder {
	let shared_data = match data.lock() {
		Ok(m) => m,
		Err(_) => return lock_failed(),
	};

	let Some(chain) = shared_data.chains.get(&query.model) else {
		return HttpResponse::NotFound().body(format!("Model {} not loaded", query.model));
	};

	match chain.transition_probability(&query.next, &tokenize(&query.current)) {
		Ok(probability) => HttpResponse::Ok().json(ProbabilityResponse { probability }),
		Err(e) => chain_error_response(e),
	}
}

/// HTTP POST endpoint `/v1/train`
///
/// Adds every non-blank line of the body to the named chain, creating it with
/// the requested order if needed.
#[post("/v1/train")]
async fn post_train(data: web::Data<Mutex<SharedData>>, query: web::Query<TrainQuery>, body: String) -> impl Responder {
	let mut shared_data = match data.lock() {
		Ok(m) => m,
		Err(_) => return lock_failed(),
	};

	let order = query.order.unwrap_or(shared_data.config.default_order).max(1);
	let chain = shared_data.chains.entry(query.model.clone()).or_insert_with(|| Chain::new(order));
	if query.order.is_some() && chain.order() != order {
		return chain_error_response(ChainError::OrderMismatch { left: chain.order(), right: order });
	}

	let sequences = tokenize_lines(&body);
	for sequence in &sequences {
		chain.add(sequence);
	}
	info!("trained {} on {} sequences", query.model, sequences.len());

	HttpResponse::Ok().json(TrainResponse {
		sequences: sequences.len(),
		states: chain.state_count(),
		vocabulary: chain.vocabulary_len(),
	})
}

/// HTTP GET endpoint `/v1/models`
///
/// Lists the corpora available in the data directory.
#[get("/v1/models")]
async fn get_models(data: web::Data<Mutex<SharedData>>) -> impl Responder {
	let data_dir = match data.lock() {
		Ok(m) => m.config.data_dir.clone(),
		Err(_) => return lock_failed(),
	};
	match list_files(&data_dir, CORPUS_EXTENSION) {
		Ok(files) => {
			let suffix = format!(".{CORPUS_EXTENSION}");
			let names: Vec<&str> = files.iter().map(|f| f.trim_end_matches(&suffix)).collect();
			HttpResponse::Ok().body(names.join("\n"))
		}
		Err(_) => HttpResponse::InternalServerError().body("Failed to list models"),
	}
}

#[get("/v1/loaded_models")]
async fn get_loaded_models(data: web::Data<Mutex<SharedData>>) -> impl Responder {
	let shared_data = match data.lock() {
		Ok(m) => m,
		Err(_) => return lock_failed(),
	};
	let mut names: Vec<&str> = shared_data.chains.keys().map(String::as_str).collect();
	names.sort_unstable();
	HttpResponse::Ok().body(names.join("\n"))
}

/// HTTP PUT endpoint `/v1/load_models`
///
/// Loads each named corpus from the data directory into its own chain,
/// replacing any chain already loaded under that name. Nothing is replaced
/// unless every corpus loads.
#[put("/v1/load_models")]
async fn put_model(data: web::Data<Mutex<SharedData>>, query: web::Query<ModelQuery>) -> impl Responder {
	let mut shared_data = match data.lock() {
		Ok(m) => m,
		Err(_) => return lock_failed(),
	};

	let query_names = match &query.names {
		Some(s) if !s.trim().is_empty() => s.trim(),
		_ => return HttpResponse::BadRequest().body("Missing or empty model name"),
	};

	let model_names: Vec<&str> = query_names
		.split(',')
		.map(|s| s.trim())
		.filter(|s| !s.is_empty())
		.collect();

	let order = query.order.unwrap_or(shared_data.config.default_order);
	let mut loaded = Vec::with_capacity(model_names.len());
	for name in model_names {
		let model_path = shared_data.config.data_dir.join(format!("{name}.{CORPUS_EXTENSION}"));
		match load_corpus(&model_path, order) {
			Ok(chain) => loaded.push((name.to_owned(), chain)),
			Err(e) => return HttpResponse::InternalServerError().body(format!("Failed to load model {name}: {e}")),
		}
	}

	for (name, chain) in loaded {
		info!("loaded {name}: {} states", chain.state_count());
		shared_data.chains.insert(name, chain);
	}

	HttpResponse::Ok().body("Models loaded successfully")
}

fn configure(cfg: &mut web::ServiceConfig) {
	cfg.service(get_generated)
		.service(get_probability)
		.service(post_train)
		.service(get_models)
		.service(put_model)
		.service(get_loaded_models);
}

/// Main entry point for the server.
///
/// Reads the configuration from the environment, wraps the chains in a
/// `Mutex` and starts the Actix-web HTTP server.
#[actix_web::main]
async fn main() -> std::io::Result<()> {
	env_logger::init();

	let config = ServerConfig::from_env();
	let bind = config.bind;
	info!("serving corpora from {} on {bind}", config.data_dir.display());

	let shared_data = web::Data::new(Mutex::new(SharedData::new(config)));

	HttpServer::new(move || {
		App::new()
			.wrap(Cors::permissive())
			.wrap(middleware::Logger::default())
			.app_data(shared_data.clone())
			.configure(configure)
	})
		.bind(bind)?
		.run()
		.await
}
