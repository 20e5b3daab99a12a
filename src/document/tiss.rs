//! Streaming parser for TISS `mensagemTISS` batch documents.
//!
//! Only the elements needed to build a [`ParsedBatchDocument`] are read; the
//! guide bodies are skipped. Namespace prefixes (`ans:`) are ignored.

use std::str::FromStr;

use quick_xml::{Reader, events::Event};
use rust_decimal::Decimal;

use super::{BatchInfo, DocumentParser, ParseError, ParsedBatchDocument, PayerInfo, TransactionHeader};

/// Local name of the document root.
pub const ROOT_ELEMENT: &str = "mensagemTISS";

/// [`DocumentParser`] for TISS batch messages.
#[derive(Debug, Clone, Copy, Default)]
pub struct TissParser;

impl DocumentParser for TissParser {
    fn parse(&self, bytes: &[u8]) -> Result<ParsedBatchDocument, ParseError> {
        let mut reader = Reader::from_reader(bytes);
        reader.trim_text(true);

        let mut buf = Vec::new();
        let mut path: Vec<String> = Vec::new();
        let mut text = String::new();
        let mut root_seen = false;
        let mut acc = Accumulator::default();

        loop {
            let event = reader
                .read_event_into(&mut buf)
                .map_err(|e| xml_error(&reader, e))?;

            match event {
                Event::Start(e) => {
                    let name = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                    open_element(&mut path, &mut root_seen, name)?;
                    acc.enter(&path);
                    text.clear();
                }
                Event::Empty(e) => {
                    let name = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                    open_element(&mut path, &mut root_seen, name)?;
                    acc.enter(&path);
                    path.pop();
                }
                Event::Text(t) => {
                    let s = t.unescape().map_err(|e| xml_error(&reader, e))?;
                    outside_root_text(&path, &s)?;
                    text.push_str(&s);
                }
                Event::CData(c) => {
                    let s = reader
                        .decoder()
                        .decode(&c)
                        .map_err(|e| xml_error(&reader, e))?;
                    outside_root_text(&path, &s)?;
                    text.push_str(&s);
                }
                Event::End(_) => {
                    acc.leave(&path, text.trim())?;
                    text.clear();
                    path.pop();
                }
                Event::Eof => break,
                _ => {}
            }
            buf.clear();
        }

        if let Some(open) = path.last() {
            return Err(ParseError::Truncated {
                element: open.clone(),
            });
        }
        if !root_seen {
            return Err(ParseError::Empty);
        }

        Ok(acc.finish())
    }
}

fn xml_error<R>(reader: &Reader<R>, err: quick_xml::Error) -> ParseError {
    ParseError::Xml {
        position: reader.buffer_position() as u64,
        message: err.to_string(),
    }
}

fn open_element(path: &mut Vec<String>, root_seen: &mut bool, name: String) -> Result<(), ParseError> {
    if path.is_empty() {
        if *root_seen {
            return Err(ParseError::TrailingContent { element: name });
        }
        if name != ROOT_ELEMENT {
            return Err(ParseError::UnexpectedRoot {
                found: name,
                expected: ROOT_ELEMENT,
            });
        }
        *root_seen = true;
    }
    path.push(name);
    Ok(())
}

fn outside_root_text(path: &[String], s: &str) -> Result<(), ParseError> {
    let s = s.trim();
    if path.is_empty() && !s.is_empty() {
        return Err(ParseError::TextOutsideRoot {
            text: s.chars().take(32).collect(),
        });
    }
    Ok(())
}

fn within(path: &[String], name: &str) -> bool {
    path.iter().any(|p| p == name)
}

fn parent_is(path: &[String], name: &str) -> bool {
    path.len() >= 2 && path[path.len() - 2] == name
}

// First non-empty occurrence wins.
fn set_once(slot: &mut Option<String>, value: &str) {
    if slot.is_none() {
        *slot = Some(value.to_string());
    }
}

#[derive(Debug, Default)]
struct Accumulator {
    header_seen: bool,
    lote_seen: bool,
    destino_seen: bool,
    header: TransactionHeader,
    batch: BatchInfo,
    payer: PayerInfo,
    declared_total: Option<Decimal>,
}

impl Accumulator {
    fn enter(&mut self, path: &[String]) {
        match path.last().map(String::as_str) {
            Some("cabecalho") => self.header_seen = true,
            Some("loteGuias") => self.lote_seen = true,
            Some("destino") if within(path, "cabecalho") => self.destino_seen = true,
            _ => {}
        }
    }

    fn leave(&mut self, path: &[String], value: &str) -> Result<(), ParseError> {
        if value.is_empty() {
            return Ok(());
        }
        let Some(leaf) = path.last() else {
            return Ok(());
        };
        let in_header = within(path, "cabecalho");

        match leaf.as_str() {
            "tipoTransacao" if in_header => set_once(&mut self.header.transaction_type, value),
            "sequencialTransacao" if in_header => {
                set_once(&mut self.header.transaction_sequence, value)
            }
            "dataRegistroTransacao" if in_header => {
                set_once(&mut self.header.registration_date, value)
            }
            "horaRegistroTransacao" if in_header => {
                set_once(&mut self.header.registration_time, value)
            }
            "CNPJ" | "CPF" | "codigoPrestadorNaOperadora"
                if in_header && within(path, "origem") && parent_is(path, "identificacaoPrestador") =>
            {
                set_once(&mut self.header.provider_tax_id, value)
            }
            "registroANS" if in_header && parent_is(path, "destino") => {
                set_once(&mut self.header.payer_registry, value);
                set_once(&mut self.payer.registry_number, value);
            }
            "Padrao" | "versaoPadrao" if in_header => {
                set_once(&mut self.header.standard_version, value)
            }
            "hash" if within(path, "epilogo") => set_once(&mut self.header.hash, value),
            "nomeContratado" | "nomePrestador" => set_once(&mut self.header.provider_name, value),
            "CNES" => set_once(&mut self.header.cnes, value),
            "nomeOperadora" => set_once(&mut self.payer.name, value),
            "numeroLote" if within(path, "loteGuias") => {
                set_once(&mut self.batch.batch_number, value)
            }
            "competencia" => set_once(&mut self.batch.billing_period, value),
            "valorTotalGeral" => {
                let invalid = || ParseError::InvalidValue {
                    element: leaf.clone(),
                    value: value.to_string(),
                };
                let amount = Decimal::from_str(value).map_err(|_| invalid())?;
                let total = self
                    .declared_total
                    .unwrap_or_default()
                    .checked_add(amount)
                    .ok_or_else(invalid)?;
                self.declared_total = Some(total);
            }
            _ => {}
        }
        Ok(())
    }

    fn finish(self) -> ParsedBatchDocument {
        let batch_info = self.lote_seen.then(|| BatchInfo {
            submission_date: self.header.registration_date.clone(),
            declared_total: self.declared_total,
            ..self.batch
        });
        let payer_info = self.destino_seen.then_some(self.payer);
        let header = self.header_seen.then_some(self.header);

        ParsedBatchDocument {
            header,
            batch_info,
            payer_info,
        }
    }
}
