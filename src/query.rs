//! Filtering, sorting and pagination of the vehicle catalog.
//!
//! Everything here is a pure function of its inputs: the same catalog, filter
//! and page always produce the same [`QueryPage`].

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::str::FromStr;

use crate::models::{FuelType, Vehicle};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortKey {
    #[default]
    PriceAsc,
    PriceDesc,
    YearDesc,
    YearAsc,
    MileageAsc,
    MileageDesc,
}

impl SortKey {
    pub fn as_str(self) -> &'static str {
        match self {
            SortKey::PriceAsc => "price_asc",
            SortKey::PriceDesc => "price_desc",
            SortKey::YearDesc => "year_desc",
            SortKey::YearAsc => "year_asc",
            SortKey::MileageAsc => "mileage_asc",
            SortKey::MileageDesc => "mileage_desc",
        }
    }

    pub fn compare(self, a: &Vehicle, b: &Vehicle) -> Ordering {
        match self {
            SortKey::PriceAsc => a.price.cmp(&b.price),
            SortKey::PriceDesc => b.price.cmp(&a.price),
            SortKey::YearDesc => b.year.cmp(&a.year),
            SortKey::YearAsc => a.year.cmp(&b.year),
            SortKey::MileageAsc => a.mileage.cmp(&b.mileage),
            SortKey::MileageDesc => b.mileage.cmp(&a.mileage),
        }
    }
}

impl FromStr for SortKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "price_asc" => Ok(SortKey::PriceAsc),
            "price_desc" => Ok(SortKey::PriceDesc),
            "year_desc" => Ok(SortKey::YearDesc),
            "year_asc" => Ok(SortKey::YearAsc),
            "mileage_asc" => Ok(SortKey::MileageAsc),
            "mileage_desc" => Ok(SortKey::MileageDesc),
            other => Err(format!("unknown sort key '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FilterSpec {
    pub query: Option<String>,
    pub brands: Vec<String>,
    pub min_price: Option<u64>,
    pub max_price: Option<u64>,
    pub min_year: Option<u32>,
    pub max_year: Option<u32>,
    pub min_mileage: Option<u64>,
    pub max_mileage: Option<u64>,
    pub fuel_types: Vec<FuelType>,
    pub sort: SortKey,
}

fn in_range<T: PartialOrd>(value: T, min: Option<T>, max: Option<T>) -> bool {
    min.is_none_or(|min| value >= min) && max.is_none_or(|max| value <= max)
}

impl FilterSpec {
    /// The lowercased text query, or `None` when it is absent or blank.
    fn text_needle(&self) -> Option<String> {
        self.query
            .as_deref()
            .map(str::trim)
            .filter(|q| !q.is_empty())
            .map(str::to_lowercase)
    }

    pub fn matches(&self, vehicle: &Vehicle) -> bool {
        self.matches_with_needle(vehicle, self.text_needle().as_deref())
    }

    fn matches_with_needle(&self, vehicle: &Vehicle, needle: Option<&str>) -> bool {
        if let Some(needle) = needle {
            let hit = vehicle.brand.to_lowercase().contains(needle) || vehicle.model.to_lowercase().contains(needle);
            if !hit {
                return false;
            }
        }
        if !self.brands.is_empty() && !self.brands.iter().any(|b| *b == vehicle.brand) {
            return false;
        }
        if !in_range(vehicle.price, self.min_price, self.max_price)
            || !in_range(vehicle.year, self.min_year, self.max_year)
            || !in_range(vehicle.mileage, self.min_mileage, self.max_mileage)
        {
            return false;
        }
        self.fuel_types.is_empty() || self.fuel_types.contains(&vehicle.fuel_type)
    }

    /// Whether any criterion other than the sort order is set.
    pub fn has_active_filters(&self) -> bool {
        self.text_needle().is_some()
            || !self.brands.is_empty()
            || self.min_price.is_some()
            || self.max_price.is_some()
            || self.min_year.is_some()
            || self.max_year.is_some()
            || self.min_mileage.is_some()
            || self.max_mileage.is_some()
            || !self.fuel_types.is_empty()
    }
}

/// Matching vehicles in sort order. The sort is stable, so ties keep catalog order.
pub fn filter_and_sort<'a>(vehicles: &'a [Vehicle], spec: &FilterSpec) -> Vec<&'a Vehicle> {
    let needle = spec.text_needle();
    let mut matched: Vec<&Vehicle> = vehicles
        .iter()
        .filter(|v| spec.matches_with_needle(v, needle.as_deref()))
        .collect();
    matched.sort_by(|a, b| spec.sort.compare(a, b));
    matched
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryPage {
    pub items: Vec<Vehicle>,
    pub total: usize,
    pub page: usize,
    pub page_size: usize,
    pub total_pages: usize,
}

impl QueryPage {
    /// Nothing matched the filter at all, as opposed to an empty trailing page.
    pub fn no_results(&self) -> bool {
        self.total == 0
    }
}

/// Run a filter over the catalog and cut out one 1-based page.
///
/// Page 0, a zero page size, and pages past the end all give an empty slice;
/// `total` always counts every match.
pub fn run_query(vehicles: &[Vehicle], spec: &FilterSpec, page: usize, page_size: usize) -> QueryPage {
    let matched = filter_and_sort(vehicles, spec);
    let total = matched.len();
    let total_pages = if page_size == 0 { 0 } else { total.div_ceil(page_size) };

    let items = match page
        .checked_sub(1)
        .and_then(|index| index.checked_mul(page_size))
    {
        Some(start) if page_size > 0 => matched.into_iter().skip(start).take(page_size).cloned().collect(),
        _ => Vec::new(),
    };

    tracing::debug!(total, page, page_size, returned = items.len(), "Ran vehicle query");
    QueryPage {
        items,
        total,
        page,
        page_size,
        total_pages,
    }
}

fn split_list(raw: Option<&str>) -> impl Iterator<Item = &str> {
    raw.unwrap_or("").split(',').map(str::trim).filter(|s| !s.is_empty())
}

/// A numeric bound as sent by the client: a JSON number, or the raw text of a URL parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NumberParam {
    Number(u64),
    Text(String),
}

impl From<u64> for NumberParam {
    fn from(value: u64) -> Self {
        NumberParam::Number(value)
    }
}

impl From<u32> for NumberParam {
    fn from(value: u32) -> Self {
        NumberParam::Number(u64::from(value))
    }
}

// Blank text counts as absent; anything else must be a non-negative integer that fits `T`
fn parse_bound<T: TryFrom<u64>>(
    field: &'static str,
    raw: Option<NumberParam>,
) -> Result<Option<T>, (&'static str, String)> {
    let value = match raw {
        None => return Ok(None),
        Some(NumberParam::Number(value)) => value,
        Some(NumberParam::Text(text)) => {
            let text = text.trim();
            if text.is_empty() {
                return Ok(None);
            }
            text.parse::<u64>()
                .map_err(|_| (field, format!("Keine gueltige Zahl: {}", text)))?
        }
    };
    T::try_from(value)
        .map(Some)
        .map_err(|_| (field, format!("Wert zu gross: {}", value)))
}

/// Filter state as it appears in the listing URL.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListingParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub q: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub brands: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_price: Option<NumberParam>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_price: Option<NumberParam>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_year: Option<NumberParam>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_year: Option<NumberParam>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_mileage: Option<NumberParam>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_mileage: Option<NumberParam>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fuel: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<NumberParam>,
}

impl ListingParams {
    /// Returns the filter and the requested page (1 when absent).
    /// Unknown fuel types or sort keys are rejected with the offending field name.
    pub fn into_spec(self) -> Result<(FilterSpec, usize), (&'static str, String)> {
        let fuel_types = split_list(self.fuel.as_deref())
            .map(|f| f.parse::<FuelType>().map_err(|e| ("fuel", e)))
            .collect::<Result<Vec<_>, _>>()?;
        let sort = match self.sort.as_deref().filter(|s| !s.is_empty()) {
            Some(raw) => raw.parse::<SortKey>().map_err(|e| ("sort", e))?,
            None => SortKey::default(),
        };
        let page = parse_bound("page", self.page)?.unwrap_or(1);
        let spec = FilterSpec {
            query: self.q.filter(|q| !q.trim().is_empty()),
            brands: split_list(self.brands.as_deref()).map(str::to_string).collect(),
            min_price: parse_bound("minPrice", self.min_price)?,
            max_price: parse_bound("maxPrice", self.max_price)?,
            min_year: parse_bound("minYear", self.min_year)?,
            max_year: parse_bound("maxYear", self.max_year)?,
            min_mileage: parse_bound("minMileage", self.min_mileage)?,
            max_mileage: parse_bound("maxMileage", self.max_mileage)?,
            fuel_types,
            sort,
        };
        Ok((spec, page))
    }

    /// URL form of `spec`; defaults (price ascending, page 1) are left out.
    pub fn from_spec(spec: &FilterSpec, page: usize) -> Self {
        let join = |items: Vec<&str>| (!items.is_empty()).then(|| items.join(","));
        ListingParams {
            q: spec.text_needle().and(spec.query.clone()),
            brands: join(spec.brands.iter().map(String::as_str).collect()),
            min_price: spec.min_price.map(NumberParam::from),
            max_price: spec.max_price.map(NumberParam::from),
            min_year: spec.min_year.map(NumberParam::from),
            max_year: spec.max_year.map(NumberParam::from),
            min_mileage: spec.min_mileage.map(NumberParam::from),
            max_mileage: spec.max_mileage.map(NumberParam::from),
            fuel: join(spec.fuel_types.iter().map(|f| f.label()).collect()),
            sort: (spec.sort != SortKey::default()).then(|| spec.sort.as_str().to_string()),
            page: (page > 1).then(|| NumberParam::from(page as u64)),
        }
    }
}
