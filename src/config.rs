/*
 * ParBPR
 * Copyright (C) 2018 Sebastian Schelter
 *
 * This program is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * This program is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with this program. If not, see <http://www.gnu.org/licenses/>.
 */


use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use crate::error::{Error, Result};

/// Hyperparameters for pairwise ranking training. Field names are used in JSON config files,
/// missing fields fall back to the defaults.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct Hyperparams {
    /// Dimensionality F of the latent factors.
    pub num_factors: usize,
    /// Mean of the gaussian used to initialize the factors.
    pub mu: f64,
    /// Standard deviation of the gaussian used to initialize the factors.
    pub sigma: f64,
    /// Regularization of user factors.
    pub reg_user: f64,
    /// Regularization of the factors of positive items.
    pub reg_positive: f64,
    /// Regularization of the factors of sampled negative items.
    pub reg_negative: f64,
    pub learning_rate: f64,
    /// Total number of epochs, split across all workers.
    pub num_epochs: usize,
    pub num_threads: usize,
}

impl Default for Hyperparams {

    fn default() -> Self {
        Hyperparams {
            num_factors: 40,
            mu: 0.0,
            sigma: 0.01,
            reg_user: 0.0025,
            reg_positive: 0.0025,
            reg_negative: 0.00025,
            learning_rate: 0.01,
            num_epochs: 64,
            num_threads: num_cpus::get(),
        }
    }
}

impl Hyperparams {

    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let reader = BufReader::new(File::open(path)?);
        let hyperparams: Hyperparams = serde_json::from_reader(reader)?;
        Ok(hyperparams)
    }

    pub fn validate(&self) -> Result<()> {
        if self.num_factors == 0 {
            return Err(Error::InvalidConfig("num_factors must be positive".to_owned()));
        }

        if self.num_threads == 0 {
            return Err(Error::InvalidConfig("num_threads must be positive".to_owned()));
        }

        if !self.sigma.is_finite() || self.sigma < 0.0 {
            return Err(Error::InvalidConfig(
                format!("sigma must be finite and non-negative, got {}", self.sigma)));
        }

        let finite = [
            ("mu", self.mu),
            ("reg_user", self.reg_user),
            ("reg_positive", self.reg_positive),
            ("reg_negative", self.reg_negative),
            ("learning_rate", self.learning_rate),
        ];

        for (name, value) in finite.iter() {
            if !value.is_finite() {
                return Err(Error::InvalidConfig(format!("{} must be finite, got {}", name, value)));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {

    use std::io::Write;

    use super::Hyperparams;
    use crate::error::Error;

    #[test]
    fn defaults_are_valid() {
        let hyperparams = Hyperparams::default();
        assert!(hyperparams.validate().is_ok());
        assert_eq!(hyperparams.num_factors, 40);
        assert!(hyperparams.num_threads >= 1);
    }

    #[test]
    fn partial_json_falls_back_to_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"num_factors": 8, "learning_rate": 0.05, "num_threads": 2}}"#).unwrap();

        let hyperparams = Hyperparams::from_json_file(file.path()).unwrap();

        assert_eq!(hyperparams.num_factors, 8);
        assert_eq!(hyperparams.learning_rate, 0.05);
        assert_eq!(hyperparams.num_threads, 2);
        assert_eq!(hyperparams.reg_negative, 0.00025);
        assert_eq!(hyperparams.num_epochs, 64);
    }

    #[test]
    fn rejects_degenerate_settings() {
        let zero_factors = Hyperparams { num_factors: 0, ..Hyperparams::default() };
        assert!(matches!(zero_factors.validate(), Err(Error::InvalidConfig(_))));

        let zero_threads = Hyperparams { num_threads: 0, ..Hyperparams::default() };
        assert!(matches!(zero_threads.validate(), Err(Error::InvalidConfig(_))));

        let nan_rate = Hyperparams { learning_rate: std::f64::NAN, ..Hyperparams::default() };
        assert!(matches!(nan_rate.validate(), Err(Error::InvalidConfig(_))));
    }
}
