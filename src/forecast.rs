//! Statistical forecaster: least-squares linear regression over yearly
//! event counts, with a widening confidence interval. Fewer than two usable
//! points passes the series through untouched with neutral stats.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SeriesPoint {
    pub date: String,
    pub count: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ForecastPoint {
    pub date: String,
    pub prediction: f64,
    pub upper: f64,
    pub lower: f64,
}

#[derive(Debug, Clone, Serialize, Default)]
pub struct ForecastStats {
    pub trend_factor: f64,
    pub volatility: f64,
    pub r_squared: f64,
    pub slope: f64,
    pub topic: String,
}

#[derive(Debug, Clone, Serialize, Default)]
pub struct Forecast {
    pub historical: Vec<SeriesPoint>,
    pub forecast: Vec<ForecastPoint>,
    pub stats: ForecastStats,
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

/// Fit yearly counts and project `horizon_days` forward (floored to whole
/// years). Duplicate entries within a year keep the maximum count.
pub fn generate_forecast(
    series: &[SeriesPoint],
    topic: Option<&str>,
    horizon_days: u32,
    current_year: i32,
) -> Forecast {
    let topic = topic.unwrap_or("All").to_string();

    // Group by year, max count per year.
    let mut by_year: BTreeMap<i32, i64> = BTreeMap::new();
    for point in series {
        let Some(year) = point.date.get(..4).and_then(|y| y.parse::<i32>().ok()) else {
            continue;
        };
        let slot = by_year.entry(year).or_insert(point.count);
        *slot = (*slot).max(point.count);
    }

    if by_year.len() < 2 {
        return Forecast {
            historical: series.to_vec(),
            forecast: Vec::new(),
            stats: ForecastStats {
                trend_factor: 1.0,
                topic,
                ..Default::default()
            },
        };
    }

    let years: Vec<f64> = by_year.keys().map(|y| *y as f64).collect();
    let counts: Vec<f64> = by_year.values().map(|c| *c as f64).collect();
    let n = years.len() as f64;

    let mean_x = years.iter().sum::<f64>() / n;
    let mean_y = counts.iter().sum::<f64>() / n;
    let ss_xy: f64 = years
        .iter()
        .zip(&counts)
        .map(|(x, y)| (x - mean_x) * (y - mean_y))
        .sum();
    let ss_xx: f64 = years.iter().map(|x| (x - mean_x).powi(2)).sum();

    let slope = if ss_xx == 0.0 { 0.0 } else { ss_xy / ss_xx };
    let intercept = mean_y - slope * mean_x;

    let residuals: Vec<f64> = years
        .iter()
        .zip(&counts)
        .map(|(x, y)| y - (slope * x + intercept))
        .collect();
    let ss_res: f64 = residuals.iter().map(|r| r * r).sum();
    let ss_tot: f64 = counts.iter().map(|y| (y - mean_y).powi(2)).sum();
    let r_squared = if ss_tot == 0.0 {
        if ss_res == 0.0 { 1.0 } else { 0.0 }
    } else {
        1.0 - ss_res / ss_tot
    };
    let std_error = (ss_res / n).sqrt();

    let last_year = *by_year.keys().last().expect("non-empty map");
    let start_year = current_year.max(last_year) + 1;
    let horizon_years = (horizon_days / 365).max(1);

    let mut forecast = Vec::with_capacity(horizon_years as usize);
    for i in 0..horizon_years {
        let future_year = start_year + i as i32;
        let prediction = (slope * future_year as f64 + intercept).max(0.0).round();
        let uncertainty = 1.96 * std_error * (1.0 + i as f64 * 0.1);
        forecast.push(ForecastPoint {
            date: future_year.to_string(),
            prediction,
            upper: (prediction + uncertainty).round(),
            lower: (prediction - uncertainty).max(0.0).round(),
        });
    }

    let historical = by_year
        .iter()
        .map(|(year, count)| SeriesPoint {
            date: year.to_string(),
            count: *count,
        })
        .collect();

    let avg = if mean_y > 0.0 { mean_y } else { 1.0 };
    Forecast {
        historical,
        forecast,
        stats: ForecastStats {
            trend_factor: round2(1.0 + slope / avg),
            volatility: round2(std_error),
            r_squared: round2(r_squared),
            slope: round2(slope),
            topic,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pt(date: &str, count: i64) -> SeriesPoint {
        SeriesPoint {
            date: date.into(),
            count,
        }
    }

    #[test]
    fn short_series_passes_through_with_neutral_stats() {
        let out = generate_forecast(&[pt("2025-03", 12)], Some("attacks"), 365, 2026);
        assert_eq!(out.historical.len(), 1);
        assert!(out.forecast.is_empty());
        assert_eq!(out.stats.trend_factor, 1.0);
        assert_eq!(out.stats.topic, "attacks");
    }

    #[test]
    fn linear_growth_projects_forward() {
        let series = vec![pt("2023-01", 100), pt("2024-01", 110), pt("2025-01", 120)];
        let out = generate_forecast(&series, None, 365, 2025);
        assert_eq!(out.forecast.len(), 1);
        let f = &out.forecast[0];
        assert_eq!(f.date, "2026");
        assert!((f.prediction - 130.0).abs() < 1.0);
        assert!(out.stats.r_squared > 0.99);
        assert!(out.stats.slope > 9.0 && out.stats.slope < 11.0);
        assert!(f.upper >= f.prediction && f.lower <= f.prediction);
    }

    #[test]
    fn duplicate_years_keep_the_max_count() {
        let series = vec![pt("2024-01", 5), pt("2024-06", 40), pt("2025-02", 50)];
        let out = generate_forecast(&series, None, 365, 2025);
        assert_eq!(out.historical[0], pt("2024", 40));
        assert_eq!(out.historical[1], pt("2025", 50));
    }

    #[test]
    fn horizon_floors_to_at_least_one_year() {
        let series = vec![pt("2024", 10), pt("2025", 20)];
        let out = generate_forecast(&series, None, 30, 2025);
        assert_eq!(out.forecast.len(), 1);
        let two_years = generate_forecast(&series, None, 730, 2025);
        assert_eq!(two_years.forecast.len(), 2);
        // Interval widens with distance.
        assert!(
            two_years.forecast[1].upper - two_years.forecast[1].prediction
                >= two_years.forecast[0].upper - two_years.forecast[0].prediction
        );
    }

    #[test]
    fn predictions_never_go_negative() {
        let series = vec![pt("2023", 30), pt("2024", 10), pt("2025", 1)];
        let out = generate_forecast(&series, None, 365 * 3, 2025);
        assert!(out.forecast.iter().all(|f| f.prediction >= 0.0 && f.lower >= 0.0));
    }
}
