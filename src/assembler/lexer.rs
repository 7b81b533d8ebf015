/*!
  Splits assembly source into whitespace-separated words.

  A `#` starts a comment that runs to the end of the line. Words are folded to lowercase, since
  mnemonics, register names, and labels are all case-insensitive. Each token remembers the line
  it came from for error messages.
*/

use nom::{
  branch::alt,
  bytes::complete::{is_not, take_till1},
  character::complete::{char as one_char, multispace1},
  combinator::{opt, recognize},
  multi::many0,
  sequence::pair,
  IResult,
};

pub const COMMENT_CHAR: char = '#';

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Token {
  pub text : String,
  /// 1-based source line.
  pub line : usize,
}

fn comment(input: &str) -> IResult<&str, &str> {
  recognize(pair(one_char(COMMENT_CHAR), opt(is_not("\n\r"))))(input)
}

/// Whitespace and comments between words.
fn trivia(input: &str) -> IResult<&str, &str> {
  recognize(many0(alt((multispace1, comment))))(input)
}

fn word(input: &str) -> IResult<&str, &str> {
  take_till1(|c: char| c.is_whitespace() || c == COMMENT_CHAR)(input)
}

/// Tokenizes the whole of `source`. Every non-blank, non-comment run of characters becomes a
/// token; deciding whether it means anything is left to the assembler.
pub fn tokenize(source: &str) -> Vec<Token> {
  let mut tokens = Vec::new();
  let mut rest = source;
  let mut line = 1usize;

  loop {
    let (after_trivia, skipped) = match trivia(rest) {
      Ok(parsed) => parsed,
      Err(_)     => break,
    };
    line += skipped.matches('\n').count();

    match word(after_trivia) {
      Ok((after_word, text)) => {
        tokens.push(Token { text: text.to_lowercase(), line });
        rest = after_word;
      }
      Err(_) => break,
    }
  }

  tokens
}
