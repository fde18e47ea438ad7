//! Human-readable output for CLI commands.

use std::io::{self, Write};

use folio_app::modules::books::models::Book;
use serde::Serialize;
use serde_json::Value;

use crate::client::ClientError;

/// Where and how command output is written.
pub struct Renderer<W> {
    out: W,
    json: bool,
}

impl<W: Write> Renderer<W> {
    pub fn new(out: W, json: bool) -> Self {
        Self { out, json }
    }

    fn write_json<T: Serialize + ?Sized>(&mut self, value: &T) -> io::Result<()> {
        let text = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
        writeln!(self.out, "{}", text)
    }

    pub fn books(&mut self, books: &[Book]) -> io::Result<()> {
        if self.json {
            return self.write_json(books);
        }
        if books.is_empty() {
            return writeln!(self.out, "No books found.");
        }
        for book in books {
            writeln!(self.out, "{}  {} by {}", book.id, book.title, book.author)?;
        }
        writeln!(self.out, "{} book(s)", books.len())
    }

    pub fn book(&mut self, book: &Book) -> io::Result<()> {
        if self.json {
            return self.write_json(book);
        }
        writeln!(self.out, "id:          {}", book.id)?;
        writeln!(self.out, "title:       {}", book.title)?;
        writeln!(self.out, "author:      {}", book.author)?;
        if !book.description.is_empty() {
            writeln!(self.out, "description: {}", book.description)?;
        }
        if let Some(date) = book.published_date {
            writeln!(self.out, "published:   {}", date)?;
        }
        writeln!(self.out, "created:     {}", book.created_at.to_rfc3339())?;
        writeln!(self.out, "updated:     {}", book.updated_at.to_rfc3339())
    }

    pub fn deleted(&mut self, id: &str) -> io::Result<()> {
        if self.json {
            return self.write_json(&serde_json::json!({ "deleted": id }));
        }
        writeln!(self.out, "Deleted book {}", id)
    }

    pub fn health(&mut self, body: &Value) -> io::Result<()> {
        if self.json {
            return self.write_json(body);
        }
        let status = body.get("status").and_then(Value::as_str).unwrap_or("unknown");
        writeln!(self.out, "API status: {}", status)
    }

    pub fn identity(&mut self, user: &Value) -> io::Result<()> {
        if self.json {
            return self.write_json(user);
        }
        let field = |name: &str| user.get(name).and_then(Value::as_str).unwrap_or("-").to_string();
        writeln!(self.out, "name:  {}", field("name"))?;
        writeln!(self.out, "email: {}", field("email"))
    }

    pub fn line(&mut self, text: &str) -> io::Result<()> {
        writeln!(self.out, "{}", text)
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

/// Format a client error for stderr, including per-field validation details.
pub fn error_text(err: &ClientError) -> String {
    let mut text = format!("error: {}", err);
    if let ClientError::Validation { details, .. } = err {
        for detail in details {
            let field = detail.get("field").and_then(Value::as_str).unwrap_or("?");
            let problem = detail.get("error").and_then(Value::as_str).unwrap_or("invalid");
            text.push_str(&format!("\n  {}: {}", field, problem));
        }
    }
    text
}
