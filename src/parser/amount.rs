//! Parse monetary amounts.
//!
//! Amounts are written as decimals (`12`, `12.5`, `12,50`) and stored as integer
//! cents, so that no floating point math is ever involved.

use std::{cmp::Ordering, iter::repeat};

use nom::{
    character::complete::{char, digit1, multispace0},
    combinator::{all_consuming, map_res},
    sequence::{delimited, separated_pair},
    AsChar, IResult, InputTakeAtPosition,
};

use crate::{
    error::ValidationError,
    types::{Amount, UserId, MAX_AMOUNT},
};

/// Parse a positive amount with at most two fractional digits.
pub fn parse_amount(s: &str) -> Result<Amount, ValidationError> {
    let amount = all_consuming(delimited(multispace0, cents, multispace0))(s)
        .map(|(_, amount)| amount)
        .map_err(|_| ValidationError::InvalidAmount(s.to_string()))?;

    check_range(amount)
}

/// Parse a `user_id=amount` pair, used for exact shares of an expense.
pub fn parse_share(s: &str) -> Result<(UserId, Amount), ValidationError> {
    let (user_id, amount) = all_consuming(delimited(
        multispace0,
        separated_pair(user_id, char('='), cents),
        multispace0,
    ))(s)
    .map(|(_, share)| share)
    .map_err(|_| ValidationError::InvalidShare(s.to_string()))?;

    Ok((user_id, check_range(amount)?))
}

fn check_range(amount: Amount) -> Result<Amount, ValidationError> {
    if amount <= 0 {
        Err(ValidationError::NonPositiveAmount)
    } else if amount > MAX_AMOUNT {
        Err(ValidationError::AmountTooLarge)
    } else {
        Ok(amount)
    }
}

fn user_id(s: &str) -> IResult<&str, UserId> {
    map_res(digit1, |x: &str| x.parse::<UserId>())(s)
}

fn decimal1(s: &str) -> IResult<&str, &str> {
    s.split_at_position1_complete(
        |item| !item.is_dec_digit() && item != ',' && item != '.',
        nom::error::ErrorKind::Float,
    )
}

fn cents(s: &str) -> IResult<&str, Amount> {
    map_res(decimal1, to_cents)(s)
}

fn to_cents(x: &str) -> Result<Amount, ValidationError> {
    let invalid = || ValidationError::InvalidAmount(x.to_string());

    let components: Vec<_> = x.split([',', '.']).collect();
    let (integer_part, fractional_part) = match components.as_slice() {
        [integer_part] => (*integer_part, make_string_of_char('0', 2)),
        [integer_part, fractional_part] => {
            let fractional_part = match fractional_part.len().cmp(&2) {
                Ordering::Less => {
                    fractional_part.to_string()
                        + &make_string_of_char('0', 2 - fractional_part.len())
                }
                Ordering::Equal => fractional_part.to_string(),
                Ordering::Greater => return Err(invalid()),
            };
            (*integer_part, fractional_part)
        }
        _ => return Err(invalid()),
    };

    if integer_part.is_empty() {
        return Err(invalid());
    }

    (integer_part.to_string() + &fractional_part)
        .parse::<Amount>()
        .map_err(|_| invalid())
}

fn make_string_of_char(c: char, length: usize) -> String {
    repeat(c).take(length).collect::<String>()
}
