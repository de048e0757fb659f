/// A character cursor over source text that keeps track of the line and column of the next
/// character to be read. Lines and columns are both numbered from 1.
#[derive(Debug, Clone)]
pub struct CharIter<'d> {
  text     :  &'d str,
  position :  usize,  // Byte offset of the next character
  row      :  usize,
  column   :  usize
}

impl<'d> Iterator for CharIter<'d>{
  type Item = char;

  fn next(&mut self) -> Option<char>{
    let next_char = self.peek()?;
    self.position += next_char.len_utf8();
    self.increment_location(next_char);
    Some(next_char)
  }
}

impl<'d> CharIter<'d>{

  pub fn new(text: &'d str) -> Self{
    CharIter{
      text,
      position :  0,
      row      :  1,
      column   :  1
    }
  }

  /// Returns the next character without consuming it or incrementing row/column.
  pub fn peek(&self) -> Option<char>{
    self.data().chars().next()
  }

  /// The `(line, column)` of the next character.
  pub fn location(&self) -> (usize, usize) {
    (self.row, self.column)
  }

  fn increment_location(&mut self, next_char: char){
    match next_char{

      '\n' => {
        self.row   += 1;
        self.column = 1;
      }

      _    => {
        self.column += 1;
      }

    }
  }

  /// Gives the unread remainder of the underlying string slice.
  pub fn data(&self) -> &'d str {
    &self.text[self.position..]
  }

  /// Consumes the longest prefix for which each character `c` satisfies `pred(c)`, returning
  /// the prefix, or `None` if it is empty.
  pub fn get_prefix_match(&mut self, pred: fn(char)->bool) -> Option<&'d str> {
    let text = self.data();
    let end  = text.find(|c: char| !pred(c)).unwrap_or_else(|| text.len());

    match end {

      0 => None,

      _ => {
        for c in text[..end].chars(){
          self.increment_location(c);
        }
        self.position += end;
        Some(&text[..end])
      }

    }
  }

  /// Trims whitespace in place, unlike `str::trim_left()`.
  pub fn trim_left(&mut self){
    self.get_prefix_match(char::is_whitespace);
  }

  /// Consumes everything up to, but not including, the next newline.
  pub fn skip_line(&mut self){
    self.get_prefix_match(|c: char| c != '\n');
  }
}


#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn peek_and_next(){
    let mut c = CharIter::new("abcd");
    assert_eq!(c.peek(), Some('a'));
    assert_eq!(c.next(), Some('a'));
    assert_eq!(c.next(), Some('b'));
    assert_eq!(c.next(), Some('c'));
    assert_eq!(c.peek(), Some('d'));
    assert_eq!(c.next(), Some('d'));
    assert_eq!(c.next(), None);
    assert_eq!(c.next(), None);
  }

  #[test]
  fn empty_chars(){
    let mut c = CharIter::new("");
    assert_eq!(c.peek(), None);
    assert_eq!(c.get_prefix_match(|ch: char|{ ch.is_uppercase()}), None);
    assert_eq!(c.next(), None);
    assert_eq!(c.data(), "");
  }

  #[test]
  fn get_prefix(){
    let mut c = CharIter::new("ABCDEFGabcd");
    let result = c.get_prefix_match(|ch: char|{ ch.is_uppercase()});
    assert_eq!(result, Some("ABCDEFG"));
    assert_eq!(c.location(), (1, 8));
    assert_eq!(c.next(), Some('a'));
    assert_eq!(c.data(), "bcd");
  }

  #[test]
  fn whole_text_matches(){
    let mut c = CharIter::new("12345");
    assert_eq!(c.get_prefix_match(|ch: char| ch.is_ascii_digit()), Some("12345"));
    assert_eq!(c.peek(), None);
  }

  #[test]
  fn tracks_lines(){
    let mut c = CharIter::new("  \t\n   abcd # note\nx");
    c.trim_left();
    assert_eq!(c.data(), "abcd # note\nx");
    assert_eq!(c.location(), (2, 4));
    c.skip_line();
    assert_eq!(c.data(), "\nx");
    c.trim_left();
    assert_eq!(c.location(), (3, 1));
  }

}
