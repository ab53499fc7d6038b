#![doc = "Structural parsing of PDF files: content stream operator graphs and cross reference chains."]

#[macro_use]
mod object;
pub use object::{Dictionary, Object, ObjectId, Stream, StringFormat};

mod error;
pub use error::{ContentStreamError, DecompressError, Error, ParseError, Result, XrefError};

pub mod content;
pub use content::{KeywordInstance, NodeId, OperatorGraph, OperatorNode, Visit};

pub mod filters;

pub mod keyword;
pub use keyword::{Keyword, KeywordClass, KeywordId, KeywordInfo};

mod parse_options;
pub use parse_options::{MAX_OBJECT_COUNT, MAX_XREF_CHAIN_LENGTH, ParseOptions, ParseOptionsBuilder};

mod parser;
pub use parser::{ParserInput, direct_value};

mod reader;
pub use reader::{Reader, XrefChainState};

pub mod tokenizer;
pub use tokenizer::{Token, Tokenizer};

mod writer;
pub use writer::Writer;

pub mod xref;
pub use xref::{Xref, XrefEntry, XrefType};

pub mod xref_stream;
