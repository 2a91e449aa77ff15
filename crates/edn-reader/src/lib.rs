pub mod ast;
pub mod error;
mod numbers;
pub mod reader;
pub mod source;
pub mod tags;

pub use ast::{Keyword, Span, Symbol, Value, ValueKind};
pub use error::{format_error, EdnError};
pub use reader::ReadOptions;
pub use source::Source;
pub use tags::{default_data_readers, DefaultTagReader, TagReader, TagReaderError};

use reader::Reader;

/// Reads one form from the source. A clean end-of-input returns
/// `opts.eof` when set and errors otherwise. Subsequent calls resume
/// right after the consumed form.
pub fn read(source: &mut Source, opts: &ReadOptions) -> Result<Value, EdnError> {
    let result = Reader::new(source, opts).read_top();
    result.map_err(|err| locate_err(source, err))
}

/// Reads every remaining form from the source.
pub fn read_all(source: &mut Source, opts: &ReadOptions) -> Result<Vec<Value>, EdnError> {
    let mut forms = Vec::new();
    loop {
        let next = Reader::new(source, opts)
            .read_top_or_eof()
            .map_err(|err| locate_err(source, err))?;
        match next {
            Some(form) => forms.push(form),
            None => return Ok(forms),
        }
    }
}

/// Reads one form from a string; empty input yields nil.
pub fn read_str(text: &str) -> Result<Value, EdnError> {
    read_str_with(text, &ReadOptions::default())
}

pub fn read_str_with(text: &str, opts: &ReadOptions) -> Result<Value, EdnError> {
    if text.is_empty() {
        return Ok(Value::nil());
    }
    let mut source = Source::from_string(text);
    read(&mut source, opts)
}

// Positions attach once at the outermost boundary; nested errors that
// already carry one keep it.
fn locate_err(source: &Source, err: EdnError) -> EdnError {
    let err = match source.position() {
        Some(span) => err.with_span(span),
        None => err,
    };
    err.with_file(source.file().map(str::to_string))
}
