use crate::{LrErr, Param, Result};

use super::{Dataset, FeatureIndex, Sample};

/// Parses a training file, growing `index` with every new feature key.
///
/// Each non-empty line that doesn't start with `#` holds one sample:
/// `label key:value key:value ...`. A bare `key` has value `1`.
pub fn parse_train(text: &str, index: &mut FeatureIndex) -> Result<Dataset> {
    parse_with(text, |key| Some(index.get_or_insert(key)))
}

/// Parses an evaluation file against a frozen `index`, dropping unknown keys.
pub fn parse_test(text: &str, index: &FeatureIndex) -> Result<Dataset> {
    parse_with(text, |key| index.get(key))
}

fn parse_with<F>(text: &str, mut resolve: F) -> Result<Dataset>
where
    F: FnMut(&str) -> Option<usize>,
{
    let mut samples = Vec::new();

    for (i, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let err = |reason: String| LrErr::Parse { line: i + 1, reason };
        let mut tokens = line.split_whitespace();

        let Some(label) = tokens.next() else {
            continue;
        };

        let label: Param = label
            .parse()
            .map_err(|_| err(format!("invalid label {label:?}")))?;

        if !(0. ..=1.).contains(&label) {
            return Err(err(format!("label {label} outside [0, 1]")));
        }

        let mut features = Vec::new();
        for token in tokens {
            let (key, value) = match token.rsplit_once(':') {
                Some((key, value)) => {
                    let value: Param = value
                        .parse()
                        .map_err(|_| err(format!("invalid value in {token:?}")))?;
                    (key, value)
                }
                None => (token, 1.),
            };

            if key.is_empty() {
                return Err(err(format!("empty feature key in {token:?}")));
            }

            if let Some(idx) = resolve(key) {
                features.push((idx, value));
            }
        }

        samples.push(Sample::new(label, features));
    }

    Ok(Dataset::new(samples))
}
