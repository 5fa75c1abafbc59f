use anyhow::{anyhow, bail};
use serde::{de, Deserialize, Deserializer};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, Mul};
use std::str::FromStr;

// ******** ******** ********
// **  SOURCED QUANTITIES  **
// ******** ******** ********

/// Provenance of a numeric assumption.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Source {
    #[default]
    Hypothesis,
    UserData,
    Study {
        name: String,
        #[serde(default)]
        link: Option<String>,
    },
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Source::Hypothesis => write!(f, "hypothesis"),
            Source::UserData => write!(f, "user data"),
            Source::Study { name, .. } => write!(f, "{}", name),
        }
    }
}

/// A value together with where it came from. Configs may write a bare value
/// (source defaults to hypothesis) or a table with `value`, `source` and
/// `label` entries.
#[derive(Debug, Clone, PartialEq)]
pub struct Sourced<T> {
    pub value: T,
    pub source: Source,
    pub label: Option<String>,
}

impl<T> Sourced<T> {
    pub fn new(value: T, source: Source) -> Self {
        Sourced {
            value,
            source,
            label: None,
        }
    }

    pub fn hypothesis(value: T) -> Self {
        Sourced::new(value, Source::Hypothesis)
    }

    pub fn user_data(value: T) -> Self {
        Sourced::new(value, Source::UserData)
    }

    pub fn labelled(mut self, label: &str) -> Self {
        self.label = Some(label.to_string());
        self
    }
}

impl<T: Copy + Mul<f64, Output = T>> Sourced<T> {
    /// Scales the value by a dimensionless factor, keeping provenance.
    pub fn scaled(&self, factor: f64) -> Sourced<T> {
        Sourced {
            value: self.value * factor,
            source: self.source.clone(),
            label: self.label.clone(),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum SourcedRepr<T> {
    Full {
        value: T,
        #[serde(default)]
        source: Source,
        #[serde(default)]
        label: Option<String>,
    },
    Bare(T),
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for Sourced<T> {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        match SourcedRepr::<T>::deserialize(deserializer)? {
            SourcedRepr::Full {
                value,
                source,
                label,
            } => Ok(Sourced {
                value,
                source,
                label,
            }),
            SourcedRepr::Bare(value) => Ok(Sourced::hypothesis(value)),
        }
    }
}

// ******** ******** ********
// **    UNIT PARSING      **
// ******** ******** ********

/// Splits a quantity string like "2.5 MB" into magnitude and unit suffix.
fn parse_parts(s: &str) -> anyhow::Result<(f64, &str)> {
    let s = s.trim();
    let idx = s
        .char_indices()
        .find(|(_, c)| c.is_alphabetic() && *c != 'e' && *c != 'E')
        .map(|(i, _)| i)
        .unwrap_or(s.len());

    let (magnitude, unit) = s.split_at(idx);
    let magnitude: f64 = magnitude
        .trim()
        .parse()
        .map_err(|_| anyhow!("invalid magnitude in quantity '{}'", s))?;

    if !magnitude.is_finite() {
        bail!("magnitude in quantity '{}' must be finite", s);
    }
    if magnitude < 0.0 {
        bail!("quantity '{}' must not be negative", s);
    }

    Ok((magnitude, unit.trim()))
}

fn format_magnitude(value: f64) -> String {
    if (value - value.round()).abs() < 1e-9 {
        format!("{:.0}", value)
    } else {
        format!("{:.2}", value)
    }
}

macro_rules! impl_quantity_traits {
    ($ty:ident) => {
        impl Add for $ty {
            type Output = $ty;

            fn add(self, rhs: $ty) -> $ty {
                $ty(self.0 + rhs.0)
            }
        }

        impl Mul<f64> for $ty {
            type Output = $ty;

            fn mul(self, rhs: f64) -> $ty {
                $ty(self.0 * rhs)
            }
        }

        impl Sum for $ty {
            fn sum<I: Iterator<Item = $ty>>(iter: I) -> $ty {
                iter.fold($ty(0.0), |acc, x| acc + x)
            }
        }

        impl<'de> Deserialize<'de> for $ty {
            fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
            where
                D: Deserializer<'de>,
            {
                let s = String::deserialize(deserializer)?;
                s.parse().map_err(de::Error::custom)
            }
        }
    };
}

// ******** ******** ********
// **       UNITS          **
// ******** ******** ********

/// Amount of data, stored in bytes. Decimal SI multiples.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default)]
pub struct DataSize(f64);

impl DataSize {
    pub fn zero() -> Self {
        DataSize(0.0)
    }

    pub fn from_bytes(bytes: f64) -> Self {
        DataSize(bytes)
    }

    pub fn from_kilobytes(kb: f64) -> Self {
        DataSize(kb * 1e3)
    }

    pub fn from_megabytes(mb: f64) -> Self {
        DataSize(mb * 1e6)
    }

    pub fn from_gigabytes(gb: f64) -> Self {
        DataSize(gb * 1e9)
    }

    pub fn from_terabytes(tb: f64) -> Self {
        DataSize(tb * 1e12)
    }

    pub fn bytes(self) -> f64 {
        self.0
    }

    pub fn gigabytes(self) -> f64 {
        self.0 / 1e9
    }
}

impl FromStr for DataSize {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        let (magnitude, unit) = parse_parts(s)?;
        match unit {
            "B" => Ok(DataSize::from_bytes(magnitude)),
            "kB" => Ok(DataSize::from_kilobytes(magnitude)),
            "MB" => Ok(DataSize::from_megabytes(magnitude)),
            "GB" => Ok(DataSize::from_gigabytes(magnitude)),
            "TB" => Ok(DataSize::from_terabytes(magnitude)),
            _ => bail!(
                "unknown data unit '{}' in '{}' (expected B, kB, MB, GB or TB)",
                unit,
                s
            ),
        }
    }
}

impl fmt::Display for DataSize {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let (value, unit) = if self.0 >= 1e12 {
            (self.0 / 1e12, "TB")
        } else if self.0 >= 1e9 {
            (self.0 / 1e9, "GB")
        } else if self.0 >= 1e6 {
            (self.0 / 1e6, "MB")
        } else if self.0 >= 1e3 {
            (self.0 / 1e3, "kB")
        } else {
            (self.0, "B")
        };
        write!(f, "{} {}", format_magnitude(value), unit)
    }
}

impl_quantity_traits!(DataSize);

/// Span of time, stored in seconds. A year is 365.25 days.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default)]
pub struct TimeSpan(f64);

pub const SECONDS_PER_HOUR: f64 = 3600.0;
pub const HOURS_PER_DAY: f64 = 24.0;
pub const DAYS_PER_YEAR: f64 = 365.25;

impl TimeSpan {
    pub fn zero() -> Self {
        TimeSpan(0.0)
    }

    pub fn from_seconds(seconds: f64) -> Self {
        TimeSpan(seconds)
    }

    pub fn from_minutes(minutes: f64) -> Self {
        TimeSpan(minutes * 60.0)
    }

    pub fn from_hours(hours: f64) -> Self {
        TimeSpan(hours * SECONDS_PER_HOUR)
    }

    pub fn from_days(days: f64) -> Self {
        TimeSpan::from_hours(days * HOURS_PER_DAY)
    }

    pub fn from_years(years: f64) -> Self {
        TimeSpan::from_days(years * DAYS_PER_YEAR)
    }

    pub fn seconds(self) -> f64 {
        self.0
    }

    pub fn hours(self) -> f64 {
        self.0 / SECONDS_PER_HOUR
    }
}

impl FromStr for TimeSpan {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        let (magnitude, unit) = parse_parts(s)?;
        match unit {
            "s" => Ok(TimeSpan::from_seconds(magnitude)),
            "min" | "mins" => Ok(TimeSpan::from_minutes(magnitude)),
            "h" | "hour" | "hours" => Ok(TimeSpan::from_hours(magnitude)),
            "day" | "days" => Ok(TimeSpan::from_days(magnitude)),
            "year" | "years" => Ok(TimeSpan::from_years(magnitude)),
            _ => bail!(
                "unknown time unit '{}' in '{}' (expected s, min, h, day or year)",
                unit,
                s
            ),
        }
    }
}

impl fmt::Display for TimeSpan {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let (value, unit) = if self.0 >= DAYS_PER_YEAR * 24.0 * SECONDS_PER_HOUR {
            (self.0 / (DAYS_PER_YEAR * 24.0 * SECONDS_PER_HOUR), "year")
        } else if self.0 >= 24.0 * SECONDS_PER_HOUR {
            (self.0 / (24.0 * SECONDS_PER_HOUR), "day")
        } else if self.0 >= SECONDS_PER_HOUR {
            (self.0 / SECONDS_PER_HOUR, "h")
        } else if self.0 >= 60.0 {
            (self.0 / 60.0, "min")
        } else {
            (self.0, "s")
        };
        write!(f, "{} {}", format_magnitude(value), unit)
    }
}

impl_quantity_traits!(TimeSpan);

/// Electrical power, stored in watts.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default)]
pub struct Power(f64);

impl Power {
    pub fn from_watts(watts: f64) -> Self {
        Power(watts)
    }

    pub fn watts(self) -> f64 {
        self.0
    }
}

impl FromStr for Power {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        let (magnitude, unit) = parse_parts(s)?;
        match unit {
            "W" => Ok(Power::from_watts(magnitude)),
            "kW" => Ok(Power::from_watts(magnitude * 1e3)),
            _ => bail!("unknown power unit '{}' in '{}' (expected W or kW)", unit, s),
        }
    }
}

impl fmt::Display for Power {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.0 >= 1e3 {
            write!(f, "{} kW", format_magnitude(self.0 / 1e3))
        } else {
            write!(f, "{} W", format_magnitude(self.0))
        }
    }
}

impl_quantity_traits!(Power);

/// Mass, stored in kilograms. Used for embodied-carbon assumptions.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default)]
pub struct Mass(f64);

impl Mass {
    pub fn from_kilograms(kg: f64) -> Self {
        Mass(kg)
    }

    pub fn kilograms(self) -> f64 {
        self.0
    }
}

impl FromStr for Mass {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        let (magnitude, unit) = parse_parts(s)?;
        match unit {
            "g" => Ok(Mass::from_kilograms(magnitude / 1e3)),
            "kg" => Ok(Mass::from_kilograms(magnitude)),
            "t" => Ok(Mass::from_kilograms(magnitude * 1e3)),
            _ => bail!("unknown mass unit '{}' in '{}' (expected g, kg or t)", unit, s),
        }
    }
}

impl fmt::Display for Mass {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.0 >= 1e3 {
            write!(f, "{} t", format_magnitude(self.0 / 1e3))
        } else if self.0 >= 1.0 {
            write!(f, "{} kg", format_magnitude(self.0))
        } else {
            write!(f, "{} g", format_magnitude(self.0 * 1e3))
        }
    }
}

impl_quantity_traits!(Mass);

/// Energy drawn per unit of data moved, stored in kWh/GB. Used for network
/// bandwidth energy intensity assumptions.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default)]
pub struct EnergyPerData(f64);

impl EnergyPerData {
    pub fn from_kwh_per_gb(value: f64) -> Self {
        EnergyPerData(value)
    }

    pub fn kwh_per_gb(self) -> f64 {
        self.0
    }
}

impl FromStr for EnergyPerData {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        let (magnitude, unit) = parse_parts(s)?;
        match unit {
            "kWh/GB" => Ok(EnergyPerData::from_kwh_per_gb(magnitude)),
            _ => bail!(
                "unknown energy intensity unit '{}' in '{}' (expected kWh/GB)",
                unit,
                s
            ),
        }
    }
}

impl fmt::Display for EnergyPerData {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} kWh/GB", self.0)
    }
}

impl_quantity_traits!(EnergyPerData);

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[test]
    fn can_parse_data_sizes() -> anyhow::Result<()> {
        assert_eq!("50 kB".parse::<DataSize>()?, DataSize::from_kilobytes(50.0));
        assert_eq!("2.5 MB".parse::<DataSize>()?, DataSize::from_megabytes(2.5));
        assert_eq!("1 TB".parse::<DataSize>()?, DataSize::from_terabytes(1.0));
        assert_eq!("2e3 GB".parse::<DataSize>()?, DataSize::from_terabytes(2.0));
        Ok(())
    }

    #[test]
    fn rejects_unknown_and_negative_quantities() {
        assert!("50 pebbles".parse::<DataSize>().is_err());
        assert!("-3 MB".parse::<DataSize>().is_err());
        assert!("abc MB".parse::<DataSize>().is_err());
    }

    #[test]
    fn can_parse_time_spans() -> anyhow::Result<()> {
        assert_eq!("30 s".parse::<TimeSpan>()?, TimeSpan::from_seconds(30.0));
        assert_eq!("5 min".parse::<TimeSpan>()?, TimeSpan::from_minutes(5.0));
        assert_eq!("7 year".parse::<TimeSpan>()?, TimeSpan::from_years(7.0));
        assert_eq!("365 day".parse::<TimeSpan>()?.hours(), 8760.0);
        Ok(())
    }

    #[test]
    fn can_parse_other_units() -> anyhow::Result<()> {
        assert_eq!("300 W".parse::<Power>()?, Power::from_watts(300.0));
        assert_eq!("1.5 kW".parse::<Power>()?, Power::from_watts(1500.0));
        assert_eq!("160 kg".parse::<Mass>()?, Mass::from_kilograms(160.0));
        assert_eq!(
            "0.05 kWh/GB".parse::<EnergyPerData>()?,
            EnergyPerData::from_kwh_per_gb(0.05)
        );
        Ok(())
    }

    #[test]
    fn displays_pick_a_sensible_unit() {
        assert_eq!(DataSize::from_megabytes(260.0).to_string(), "260 MB");
        assert_eq!(DataSize::from_kilobytes(0.2).to_string(), "200 B");
        assert_eq!(TimeSpan::from_seconds(90.0).to_string(), "1.50 min");
        assert_eq!(Mass::from_kilograms(3100.0).to_string(), "3.10 t");
    }

    #[derive(Deserialize)]
    struct Holder {
        size: Sourced<DataSize>,
    }

    #[test]
    fn sourced_values_deserialize_from_bare_and_full_forms() -> anyhow::Result<()> {
        let bare: Holder = toml::from_str(r#"size = "2 MB""#)?;
        assert_eq!(bare.size.value, DataSize::from_megabytes(2.0));
        assert_eq!(bare.size.source, Source::Hypothesis);

        let full: Holder = toml::from_str(
            r#"size = { value = "2 MB", source = "user-data", label = "payload" }"#,
        )?;
        assert_eq!(full.size.source, Source::UserData);
        assert_eq!(full.size.label.as_deref(), Some("payload"));

        let study: Holder = toml::from_str(
            r#"size = { value = "1 TB", source = { study = { name = "SSD study" } } }"#,
        )?;
        match study.size.source {
            Source::Study { ref name, .. } => assert_eq!(name, "SSD study"),
            _ => panic!("expected a study source"),
        }
        Ok(())
    }

    #[test]
    fn scaled_keeps_provenance() {
        let size = Sourced::user_data(DataSize::from_megabytes(2.0)).labelled("per trial");
        let scaled = size.scaled(5.0);
        assert_eq!(scaled.value, DataSize::from_megabytes(10.0));
        assert_eq!(scaled.source, Source::UserData);
        assert_eq!(scaled.label.as_deref(), Some("per trial"));
    }
}
