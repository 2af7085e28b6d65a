use anyhow::{Context, Result, bail};
use std::collections::HashSet;

/// Seed used when the CLI resolves to nothing.
pub const DEFAULT_SEED: u64 = 1337;

/// Largest span a single range token may expand to.
const MAX_RANGE_SPAN: u64 = 10_000;

/// Resolve a list of CLI seed arguments into concrete seeds.
///
/// Supports literal integers (negative values use their magnitude),
/// `0x`-prefixed hex, and ranges written `a..b` or `a..=b`. Duplicates are
/// dropped, first occurrence wins.
pub fn resolve_seed_inputs(tokens: &[String]) -> Result<Vec<u64>> {
    let mut pending: Vec<u64> = Vec::new();

    for token in tokens {
        let token = token.trim();
        if token.is_empty() {
            continue;
        }

        if let Some((start, end)) = token.split_once("..") {
            let (end, inclusive) = end
                .strip_prefix('=')
                .map_or((end, false), |rest| (rest, true));
            let start = parse_single(start)?;
            let end = parse_single(end)?;
            let last = if inclusive {
                end
            } else {
                end.checked_sub(1)
                    .with_context(|| format!("empty seed range: {token}"))?
            };
            if last < start {
                bail!("empty seed range: {token}");
            }
            if last - start >= MAX_RANGE_SPAN {
                bail!("seed range {token} expands to more than {MAX_RANGE_SPAN} seeds");
            }
            pending.extend(start..=last);
            continue;
        }

        pending.push(parse_single(token)?);
    }

    let mut seen = HashSet::new();
    pending.retain(|seed| seen.insert(*seed));

    if pending.is_empty() {
        pending.push(DEFAULT_SEED);
    }

    Ok(pending)
}

fn parse_single(token: &str) -> Result<u64> {
    let token = token.trim();
    if let Some(hex) = token
        .strip_prefix("0x")
        .or_else(|| token.strip_prefix("0X"))
    {
        return u64::from_str_radix(&hex.replace('_', ""), 16)
            .with_context(|| format!("invalid hex seed: {token}"));
    }
    if let Ok(value) = token.parse::<i64>() {
        return Ok(value.unsigned_abs());
    }
    token
        .parse::<u64>()
        .with_context(|| format!("Unrecognized seed token: {token}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(raw: &[&str]) -> Vec<String> {
        raw.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn resolves_numeric_hex_and_negative() {
        let seeds = resolve_seed_inputs(&tokens(&["42", "-7", "0xFF"])).unwrap();
        assert_eq!(seeds, [42, 7, 255]);
    }

    #[test]
    fn expands_ranges_and_dedupes() {
        let seeds = resolve_seed_inputs(&tokens(&["3..6", "5..=7", "3"])).unwrap();
        assert_eq!(seeds, [3, 4, 5, 6, 7]);
    }

    #[test]
    fn rejects_garbage_and_empty_ranges() {
        assert!(resolve_seed_inputs(&tokens(&["banana"])).is_err());
        assert!(resolve_seed_inputs(&tokens(&["5..5"])).is_err());
        assert!(resolve_seed_inputs(&tokens(&["0..=20000"])).is_err());
    }

    #[test]
    fn falls_back_to_default_seed() {
        assert_eq!(resolve_seed_inputs(&[]).unwrap(), [DEFAULT_SEED]);
    }
}
