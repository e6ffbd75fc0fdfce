use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use data_ingestion::bar::Bar;
use data_ingestion::config::DataSourceConfig;
use data_ingestion::loader::{load_bars, validate_bars};
use data_ingestion::logger::init_logger;
use feature_processing::VolatilityConfig;
use log::{error, info};
use std::io;
use std::sync::Arc;
use volatility_model::model::{FORECAST, PREDICTION};
use volatility_model::{FileStore, Model, RandomForestRegressor, RealizedVolatilityModel, StoreConfig};

#[derive(Parser, Debug)]
#[command(name = "volatility_model", about = "Train and query the realized volatility model")]
struct Args {
    /// TOML file with [data], [store] and [volatility] tables
    #[arg(short, long, default_value = "volatility.toml")]
    config: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fit on the configured bars and persist the model
    Train,
    /// Score every configured bar with the persisted model
    Infer,
    /// Emit the placeholder volatility forecast
    Forecast {
        #[arg(long, default_value_t = 5)]
        steps: usize,
    },
}

struct Pipeline {
    data: DataSourceConfig,
    store: StoreConfig,
    volatility: VolatilityConfig,
}

impl Pipeline {
    fn new(path: &str) -> Result<Self> {
        let data = DataSourceConfig::from_file(path).context("reading [data] settings")?;
        let store = StoreConfig::from_file(path).context("reading [store] settings")?;
        let volatility = VolatilityConfig::from_file(path).context("reading [volatility] settings")?;
        volatility.log_summary();

        Ok(Self { data, store, volatility })
    }

    fn file_store(&self) -> Arc<FileStore> {
        Arc::new(FileStore::new(&self.store.dir))
    }

    fn bars(&self) -> Result<Vec<Bar>> {
        let bars = load_bars(&self.data.csv_path)
            .with_context(|| format!("loading bars from {}", self.data.csv_path.display()))?;
        validate_bars(&bars)?;
        info!("Loaded {} bars from {}", bars.len(), self.data.csv_path.display());
        Ok(bars)
    }

    fn train(&self) -> Result<()> {
        let bars = self.bars()?;
        let mut model =
            RealizedVolatilityModel::random_forest(&self.store.model_name, self.volatility.clone(), self.file_store())?;
        model.train(&bars)?;
        Ok(())
    }

    fn infer(&self) -> Result<()> {
        let bars = self.bars()?;
        let estimator = RandomForestRegressor::from_params(&self.volatility.estimator_params);
        let model = RealizedVolatilityModel::load(
            &self.store.model_name,
            self.volatility.clone(),
            estimator,
            self.file_store(),
        )?;
        let predictions = model.inference(&bars)?;

        let mut writer = csv::Writer::from_writer(io::stdout());
        writer.write_record(["timestamp", PREDICTION])?;
        let values = predictions.column(PREDICTION)?.f64()?;
        for (bar, value) in bars.iter().zip(values.into_iter()) {
            let value = value.map(|v| v.to_string()).unwrap_or_default();
            writer.write_record([bar.timestamp.to_rfc3339(), value])?;
        }
        writer.flush()?;
        Ok(())
    }

    fn forecast(&self, steps: usize) -> Result<()> {
        let model =
            RealizedVolatilityModel::random_forest(&self.store.model_name, self.volatility.clone(), self.file_store())?;
        let forecast = model.forecast(steps)?;

        let mut writer = csv::Writer::from_writer(io::stdout());
        writer.write_record([FORECAST])?;
        for value in forecast.column(FORECAST)?.f64()?.into_iter() {
            writer.write_record([value.unwrap_or_default().to_string()])?;
        }
        writer.flush()?;
        Ok(())
    }
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    init_logger();

    let args = Args::parse();
    let pipeline = Pipeline::new(&args.config)?;

    let result = match args.command {
        Command::Train => pipeline.train(),
        Command::Infer => pipeline.infer(),
        Command::Forecast { steps } => pipeline.forecast(steps),
    };
    if let Err(e) = &result {
        error!("{} failed: {:?}", args.config, e);
    }
    result
}
