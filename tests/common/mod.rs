#![allow(dead_code)]

use std::{fs, path::Path};

use loterecon::{
    batch::NewBatch,
    config::ReconcileOptions,
    core::store::MemoryBatchStore,
    document::tiss::TissParser,
    engine::reconciler::Reconciler,
    files::UploadDir,
    types::BatchId,
};

/// Header values written into a fixture document. `None` omits the element.
#[derive(Debug, Clone)]
pub struct HeaderParts {
    pub transaction_type: Option<String>,
    pub sequence: Option<String>,
    pub date: Option<String>,
    pub time: Option<String>,
    pub cnpj: Option<String>,
    pub provider_name: Option<String>,
    pub registro_ans: Option<String>,
    pub padrao: Option<String>,
    pub hash: Option<String>,
    pub cnes: Option<String>,
}

impl HeaderParts {
    pub fn full(seq: &str) -> Self {
        Self {
            transaction_type: Some("ENVIO_LOTE_GUIAS".to_string()),
            sequence: Some(seq.to_string()),
            date: Some("2024-03-15".to_string()),
            time: Some("10:30:00".to_string()),
            cnpj: Some("12345678000199".to_string()),
            provider_name: Some("Clinica Exemplo".to_string()),
            registro_ans: Some("123456".to_string()),
            padrao: Some("4.01.00".to_string()),
            hash: Some(format!("hash{seq}")),
            cnes: Some("7654321".to_string()),
        }
    }
}

fn element(out: &mut String, name: &str, value: &Option<String>) {
    if let Some(v) = value {
        out.push_str(&format!("<ans:{name}>{v}</ans:{name}>"));
    }
}

/// Builds a TISS batch message. Without a header there is no `cabecalho`
/// and no epilogue hash.
pub fn tiss_xml(header: Option<&HeaderParts>, batch_number: &str, totals: &[&str]) -> String {
    let mut out = String::from(
        "<?xml version=\"1.0\" encoding=\"ISO-8859-1\"?>\n\
         <ans:mensagemTISS xmlns:ans=\"http://www.ans.gov.br/padroes/tiss/schemas\">",
    );

    if let Some(h) = header {
        out.push_str("<ans:cabecalho><ans:identificacaoTransacao>");
        element(&mut out, "tipoTransacao", &h.transaction_type);
        element(&mut out, "sequencialTransacao", &h.sequence);
        element(&mut out, "dataRegistroTransacao", &h.date);
        element(&mut out, "horaRegistroTransacao", &h.time);
        out.push_str("</ans:identificacaoTransacao>");
        out.push_str("<ans:origem><ans:identificacaoPrestador>");
        element(&mut out, "CNPJ", &h.cnpj);
        out.push_str("</ans:identificacaoPrestador></ans:origem>");
        out.push_str("<ans:destino>");
        element(&mut out, "registroANS", &h.registro_ans);
        out.push_str("</ans:destino>");
        element(&mut out, "Padrao", &h.padrao);
        out.push_str("</ans:cabecalho>");
    }

    out.push_str("<ans:prestadorParaOperadora><ans:loteGuias>");
    out.push_str(&format!("<ans:numeroLote>{batch_number}</ans:numeroLote><ans:guiasTISS>"));
    for total in totals {
        out.push_str("<ans:guiaSP-SADT><ans:dadosExecutante><ans:contratadoExecutante>");
        out.push_str("<ans:codigoPrestadorNaOperadora>999</ans:codigoPrestadorNaOperadora>");
        if let Some(h) = header {
            element(&mut out, "nomeContratado", &h.provider_name);
        }
        out.push_str("</ans:contratadoExecutante>");
        if let Some(h) = header {
            element(&mut out, "CNES", &h.cnes);
        }
        out.push_str("</ans:dadosExecutante>");
        out.push_str(&format!(
            "<ans:valorTotal><ans:valorTotalGeral>{total}</ans:valorTotalGeral></ans:valorTotal>"
        ));
        out.push_str("</ans:guiaSP-SADT>");
    }
    out.push_str("</ans:guiasTISS></ans:loteGuias></ans:prestadorParaOperadora>");

    if let Some(h) = header {
        out.push_str("<ans:epilogo>");
        element(&mut out, "hash", &h.hash);
        out.push_str("</ans:epilogo>");
    }
    out.push_str("</ans:mensagemTISS>");
    out
}

/// A well-formed document with every header field present.
pub fn full_xml(seq: &str) -> String {
    tiss_xml(Some(&HeaderParts::full(seq)), seq, &["100.00"])
}

pub fn write_file(dir: &Path, name: &str, content: &str) {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("create dirs");
    }
    fs::write(path, content).expect("write fixture");
}

pub fn seed(store: &MemoryBatchStore, id: BatchId, filename: &str) -> BatchId {
    store
        .insert_batch(&NewBatch {
            id: Some(id),
            batch_number: format!("{id:06}"),
            xml_filename: filename.to_string(),
        })
        .expect("seed batch")
}

pub fn memory_reconciler(store: &MemoryBatchStore, root: &Path) -> Reconciler {
    Reconciler::new(
        Box::new(store.clone()),
        Box::new(UploadDir::new(root)),
        Box::new(TissParser),
        ReconcileOptions::default(),
    )
}
