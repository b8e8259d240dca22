// ============================================================================
// Unit String Parser
// ============================================================================
//
// Grammar, scanned left to right:
//   term     := [prefix] symbol ['^' ['-'] digits]
//   '/'      flips the sign of every later exponent (at most once)
//   ' ', '1' skipped
//
// A prefix is only taken when a word character follows it and the rest
// matches a symbol; otherwise the same position is read as a bare symbol, so
// "m" is the metre and "mm" the millimetre.

use smallvec::SmallVec;

use super::prefix::Prefix;
use super::registry::{SymbolId, UnitRegistry};
use super::unit::{Unit, UnitTerm};
use crate::numeric::ParseError;

pub(crate) fn parse_unit(registry: &UnitRegistry, input: &str) -> Result<Unit, ParseError> {
    let chars: Vec<char> = input.chars().collect();
    let mut terms: SmallVec<[UnitTerm; 4]> = SmallVec::new();
    let mut divided = false;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            '/' => {
                if divided {
                    return Err(ParseError::SecondSlash {
                        input: input.to_string(),
                    });
                }
                divided = true;
                i += 1;
                continue;
            }
            '(' | ')' | '{' | '}' => {
                return Err(ParseError::Parentheses {
                    input: input.to_string(),
                });
            }
            '1' => {
                i += 1;
                continue;
            }
            c if c.is_whitespace() => {
                i += 1;
                continue;
            }
            _ => {}
        }

        let Some((prefix, symbol, consumed)) = match_symbol(registry, &chars, i) else {
            return Err(ParseError::UnknownCharacter {
                input: input.to_string(),
                character: c,
                position: i,
            });
        };
        i += consumed;

        let (power, consumed) = match_exponent(input, &chars, i)?;
        i += consumed;
        let power = if divided { -power } else { power };

        accumulate(registry, input, &mut terms, symbol, prefix, power)?;
    }

    terms.retain(|term| term.power() != 0);
    terms.sort_by_key(|term| term.symbol());
    Ok(Unit::from_sorted_terms(terms))
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Prefix, symbol and number of chars consumed at position `i`.
fn match_symbol(
    registry: &UnitRegistry,
    chars: &[char],
    i: usize,
) -> Option<(Prefix, SymbolId, usize)> {
    let prefix = Prefix::from_char(chars[i]);
    if let Some(prefix) = prefix {
        if chars.get(i + 1).copied().is_some_and(is_word_char) {
            if let Some((symbol, len)) = registry.longest_match(&chars[i + 1..]) {
                return Some((prefix, symbol, len + 1));
            }
        }
    }
    registry
        .longest_match(&chars[i..])
        .map(|(symbol, len)| (Prefix::None, symbol, len))
}

/// Exponent starting at position `i`; `(1, 0)` when there is none.
///
/// A caret without digits is left in place so it gets reported as an
/// unknown character.
fn match_exponent(input: &str, chars: &[char], i: usize) -> Result<(i32, usize), ParseError> {
    if chars.get(i) != Some(&'^') {
        return Ok((1, 0));
    }
    let mut j = i + 1;
    let negative = chars.get(j) == Some(&'-');
    if negative {
        j += 1;
    }
    let start = j;
    while chars.get(j).is_some_and(char::is_ascii_digit) {
        j += 1;
    }
    if j == start {
        return Ok((1, 0));
    }

    let digits: String = chars[start..j].iter().collect();
    let magnitude = digits
        .parse::<i32>()
        .map_err(|_| ParseError::InvalidExponent {
            input: input.to_string(),
            exponent: digits.clone(),
        })?;
    let power = if negative { -magnitude } else { magnitude };
    Ok((power, j - i))
}

fn accumulate(
    registry: &UnitRegistry,
    input: &str,
    terms: &mut SmallVec<[UnitTerm; 4]>,
    symbol: SymbolId,
    prefix: Prefix,
    power: i32,
) -> Result<(), ParseError> {
    match terms.iter_mut().find(|term| term.symbol() == symbol) {
        Some(existing) if existing.prefix() != prefix => Err(ParseError::RepeatedSymbol {
            input: input.to_string(),
            symbol: registry.symbol_name(symbol).to_string(),
            first: existing.prefix().symbol().to_string(),
            second: prefix.symbol().to_string(),
        }),
        Some(existing) => {
            let total = existing.power().checked_add(power).ok_or_else(|| {
                ParseError::InvalidExponent {
                    input: input.to_string(),
                    exponent: power.to_string(),
                }
            })?;
            *existing = UnitTerm::new(symbol, prefix, total);
            Ok(())
        }
        None => {
            terms.push(UnitTerm::new(symbol, prefix, power));
            Ok(())
        }
    }
}
