use jiff::{Timestamp, civil::Date, tz::TimeZone};
use serde::{Deserialize, Serialize};

use crate::{
    entities::{genre, language, movie},
    error::{AppError, AppResult},
};

#[derive(Clone, Debug, Serialize)]
pub struct MovieDetails {
    #[serde(flatten)]
    pub movie: movie::Model,
    pub genre: Option<genre::Model>,
    pub language: Option<language::Model>,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MovieFilterResult {
    pub total_movies: usize,
    pub average_duration: f64,
    pub movies: Vec<MovieDetails>,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum MovieSort {
    Title,
    ReleaseDate,
}

impl MovieSort {
    pub fn from_param(param: &str) -> Option<Self> {
        match param {
            "title" => Some(MovieSort::Title),
            "release_date" => Some(MovieSort::ReleaseDate),
            _ => None,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct MovieFilterQuery {
    pub language: Option<String>,
    pub sort: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateMovieRequest {
    #[serde(alias = "tittle")]
    pub title: Option<String>,
    pub genre_id: i32,
    pub language_id: i32,
    pub oscar_count: i32,
    pub release_date: String,
    pub duration: Option<i32>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateMovieRequest {
    #[serde(alias = "tittle")]
    pub title: Option<String>,
    pub genre_id: Option<i32>,
    pub language_id: Option<i32>,
    pub oscar_count: Option<i32>,
    pub release_date: Option<String>,
    pub duration: Option<i32>,
}

#[derive(Debug, Deserialize)]
pub struct GenreRequest {
    pub name: Option<String>,
}

#[derive(Clone, Debug)]
pub struct NewMovie {
    pub title: String,
    pub genre_id: i32,
    pub language_id: i32,
    pub oscar_count: i32,
    pub release_date: Date,
    pub duration: Option<i32>,
}

#[derive(Clone, Debug, Default)]
pub struct MoviePatch {
    pub title: Option<String>,
    pub genre_id: Option<i32>,
    pub language_id: Option<i32>,
    pub oscar_count: Option<i32>,
    pub release_date: Option<Date>,
    pub duration: Option<i32>,
}

impl CreateMovieRequest {
    pub fn validate(self) -> AppResult<NewMovie> {
        Ok(NewMovie {
            title: required(self.title, "title")?,
            genre_id: self.genre_id,
            language_id: self.language_id,
            oscar_count: self.oscar_count,
            release_date: parse_release_date(&self.release_date)?,
            duration: self.duration,
        })
    }
}

impl UpdateMovieRequest {
    pub fn validate(self) -> AppResult<MoviePatch> {
        let title = self.title.map(|t| required(Some(t), "title")).transpose()?;
        let release_date = self.release_date.as_deref().map(parse_release_date).transpose()?;

        Ok(MoviePatch {
            title,
            genre_id: self.genre_id,
            language_id: self.language_id,
            oscar_count: self.oscar_count,
            release_date,
            duration: self.duration,
        })
    }
}

/// Trims `value` and rejects it when missing or blank.
pub fn required(value: Option<String>, field: &str) -> AppResult<String> {
    let value = value.as_deref().map(str::trim).unwrap_or_default();
    if value.is_empty() {
        return Err(AppError::validation(format!("{field} is required")));
    }
    Ok(value.to_string())
}

/// Key used for case-insensitive uniqueness and lookups. Full Unicode
/// lowercasing, so "AÇÃO" and "ação" share a key.
pub fn fold_case(value: &str) -> String {
    value.to_lowercase()
}

/// Accepts a plain date, an RFC 3339 timestamp (taken in UTC) or a civil datetime.
///
/// Years are limited to 1..=9999: dates are stored as `YYYY-MM-DD` text and
/// sorted as strings, which only matches calendar order for four-digit years.
pub fn parse_release_date(input: &str) -> AppResult<Date> {
    let input = input.trim();
    let date = if let Ok(ts) = input.parse::<Timestamp>() {
        ts.to_zoned(TimeZone::UTC).date()
    } else if let Ok(date) = input.parse::<Date>() {
        date
    } else if let Ok(dt) = input.parse::<jiff::civil::DateTime>() {
        dt.date()
    } else {
        return Err(AppError::validation(format!("release_date is not a valid date: {input:?}")));
    };

    if !(1..=9999).contains(&date.year()) {
        return Err(AppError::validation(format!(
            "release_date year must be between 1 and 9999: {input:?}"
        )));
    }
    Ok(date)
}

/// Absent durations count as zero minutes.
pub fn average_duration(movies: &[movie::Model]) -> f64 {
    if movies.is_empty() {
        return 0.0;
    }
    let total: i64 = movies.iter().map(|m| i64::from(m.duration.unwrap_or(0))).sum();
    total as f64 / movies.len() as f64
}
