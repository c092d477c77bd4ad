//! Command execution and output rendering.

use std::time::Duration;

use anyhow::Context;
use futures::future::join_all;
use serde_json::json;
use stockfeed_market_data::config::parse_provider_list;
use stockfeed_market_data::{
    MarketDataClient, MarketDataError, ProviderPreference, Quote, Series,
};

use crate::cli::{Cli, Command, PriceArgs, SeriesArgs};

/// Run the selected command. Returns the number of failed requests.
pub async fn run(cli: &Cli, client: &MarketDataClient) -> anyhow::Result<usize> {
    let preference = preference(cli.providers.as_deref())?;
    let deadline = cli.deadline_secs.map(Duration::from_secs);

    match &cli.command {
        Command::Price(args) => price(client, args, &preference, deadline, cli.json).await,
        Command::Series(args) => series(client, args, &preference, deadline, cli.json).await,
    }
}

fn preference(providers: Option<&str>) -> anyhow::Result<ProviderPreference> {
    match providers {
        Some(list) => {
            let ids = parse_provider_list(list).context("invalid --providers")?;
            Ok(ProviderPreference::Ordered(ids))
        }
        None => Ok(ProviderPreference::Default),
    }
}

async fn price(
    client: &MarketDataClient,
    args: &PriceArgs,
    preference: &ProviderPreference,
    deadline: Option<Duration>,
    as_json: bool,
) -> anyhow::Result<usize> {
    let requests = args.tickers.iter().map(|ticker| async move {
        let result = match deadline {
            Some(deadline) => client.get_price_within(ticker, preference, deadline).await,
            None => client.get_price_from(ticker, preference).await,
        };
        (ticker, result)
    });

    let mut failures = 0;
    for (ticker, result) in join_all(requests).await {
        if result.is_err() {
            failures += 1;
        }
        let line = if as_json {
            quote_json(ticker, &result)?
        } else {
            quote_text(ticker, &result)
        };
        println!("{}", line);
    }

    Ok(failures)
}

async fn series(
    client: &MarketDataClient,
    args: &SeriesArgs,
    preference: &ProviderPreference,
    deadline: Option<Duration>,
    as_json: bool,
) -> anyhow::Result<usize> {
    let result = match deadline {
        Some(deadline) => {
            client
                .get_series_within(&args.ticker, args.interval, args.lookback, preference, deadline)
                .await
        }
        None => {
            client
                .get_series_from(&args.ticker, args.interval, args.lookback, preference)
                .await
        }
    };

    match (&result, as_json) {
        (Ok(series), true) => println!("{}", serde_json::to_string(series)?),
        (Ok(series), false) => print!("{}", series_text(series)),
        (Err(error), true) => println!("{}", error_json(&args.ticker, error)),
        (Err(error), false) => println!("{}: {}", args.ticker, error),
    }

    Ok(usize::from(result.is_err()))
}

fn quote_text(ticker: &str, result: &Result<Quote, MarketDataError>) -> String {
    match result {
        Ok(quote) => format!(
            "{:<8} {:>12} {}  {}  {}",
            quote.ticker().as_str(),
            quote.price(),
            quote.currency(),
            quote.source(),
            quote.timestamp().to_rfc3339()
        ),
        Err(error) => format!("{:<8} {}", ticker, error),
    }
}

fn quote_json(ticker: &str, result: &Result<Quote, MarketDataError>) -> anyhow::Result<String> {
    match result {
        Ok(quote) => Ok(serde_json::to_string(quote)?),
        Err(error) => Ok(error_json(ticker, error).to_string()),
    }
}

fn error_json(ticker: &str, error: &MarketDataError) -> serde_json::Value {
    json!({
        "ticker": ticker,
        "error": error.to_string(),
    })
}

fn series_text(series: &Series) -> String {
    let mut out = format!(
        "{} {} ({} bars from {})\n",
        series.ticker(),
        series.interval(),
        series.len(),
        series.source()
    );
    for bar in series.bars() {
        let volume = bar
            .volume
            .map(|v| v.to_string())
            .unwrap_or_else(|| "-".to_string());
        out.push_str(&format!(
            "{}  {:>10} {:>10} {:>10} {:>10} {:>12}\n",
            bar.date, bar.open, bar.high, bar.low, bar.close, volume
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use stockfeed_market_data::{Bar, Interval, ProviderId, Ticker};

    fn quote() -> Quote {
        Quote::new(
            Ticker::parse("AAPL").unwrap(),
            "185.92".parse().unwrap(),
            None,
            "2024-01-05T21:00:00Z".parse().unwrap(),
            ProviderId::YahooFinance,
        )
        .unwrap()
    }

    #[test]
    fn test_preference_from_flag() {
        assert_eq!(preference(None).unwrap(), ProviderPreference::Default);
        assert_eq!(
            preference(Some("yahoo, finnhub")).unwrap(),
            ProviderPreference::Ordered(vec![ProviderId::YahooFinance, ProviderId::Finnhub])
        );
        assert!(preference(Some("polygon")).is_err());
    }

    #[test]
    fn test_quote_text_line() {
        let line = quote_text("AAPL", &Ok(quote()));
        assert!(line.starts_with("AAPL"));
        assert!(line.contains("185.92 USD"));
        assert!(line.contains("YAHOO"));
        assert!(line.contains("2024-01-05T21:00:00+00:00"));
    }

    #[test]
    fn test_failure_json_carries_message() {
        let error = MarketDataError::Timeout {
            after: Duration::from_secs(3),
        };
        let line = quote_json("MSFT", &Err(error)).unwrap();
        let value: serde_json::Value = serde_json::from_str(&line).unwrap();
        assert_eq!(value["ticker"], "MSFT");
        assert_eq!(value["error"], "Timed out after 3s");
    }

    #[test]
    fn test_quote_json_fields() {
        let line = quote_json("AAPL", &Ok(quote())).unwrap();
        let value: serde_json::Value = serde_json::from_str(&line).unwrap();
        assert_eq!(value["ticker"], "AAPL");
        assert_eq!(value["currency"], "USD");
        assert_eq!(value["source"], "YAHOO");
    }

    #[test]
    fn test_series_text_lists_every_bar() {
        let bars = vec![
            Bar {
                date: "2024-01-04".parse().unwrap(),
                open: "1".parse().unwrap(),
                high: "2".parse().unwrap(),
                low: "1".parse().unwrap(),
                close: "2".parse().unwrap(),
                volume: None,
            },
            Bar {
                date: "2024-01-05".parse().unwrap(),
                open: "2".parse().unwrap(),
                high: "3".parse().unwrap(),
                low: "2".parse().unwrap(),
                close: "3".parse().unwrap(),
                volume: Some(100),
            },
        ];
        let series = Series::new(
            Ticker::parse("IBM").unwrap(),
            Interval::Daily,
            ProviderId::Finnhub,
            bars,
        )
        .unwrap();

        let text = series_text(&series);
        assert_eq!(text.lines().count(), 3);
        assert!(text.starts_with("IBM daily (2 bars from FINNHUB)"));
        assert!(text.contains("2024-01-05"));
    }
}
