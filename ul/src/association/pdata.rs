//! Chunking of DIMSE message bytes into P-DATA-TF PDUs
//! and reassembly of incoming fragments.
use crate::pdu::{PDataValue, PDataValueType, Pdu};

/// The per-PDU overhead of a single-PDV P-DATA-TF:
/// PDV length (4), presentation context id (1)
/// and message control header (1) bytes.
const PDV_OVERHEAD: u32 = 6;

/// Split a complete command or data set stream into P-DATA-TF PDUs,
/// each carrying one PDV bounded by the peer's maximum PDU length.
///
/// The message control header marks command vs data fragments,
/// and the final fragment of the stream carries the last-fragment bit.
pub fn split_into_pdus(
    presentation_context_id: u8,
    value_type: PDataValueType,
    data: &[u8],
    max_pdu_length: u32,
) -> Vec<Pdu> {
    let max_data = (max_pdu_length - PDV_OVERHEAD) as usize;
    let mut pdus = Vec::with_capacity(data.len() / max_data + 1);
    let mut chunks = data.chunks(max_data).peekable();
    // an empty stream still produces one (empty) last fragment
    if chunks.peek().is_none() {
        return vec![Pdu::PData {
            data: vec![PDataValue {
                presentation_context_id,
                value_type,
                is_last: true,
                data: Vec::new(),
            }],
        }];
    }
    while let Some(chunk) = chunks.next() {
        pdus.push(Pdu::PData {
            data: vec![PDataValue {
                presentation_context_id,
                value_type,
                is_last: chunks.peek().is_none(),
                data: chunk.to_vec(),
            }],
        });
    }
    pdus
}

/// A fully reassembled PDV stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssembledStream {
    /// the presentation context the stream arrived on
    pub presentation_context_id: u8,
    /// whether the stream is a command set or a data set
    pub value_type: PDataValueType,
    /// the reassembled bytes
    pub data: Vec<u8>,
}

/// Reassembles PDV fragments into complete command and data streams.
///
/// Fragments of the command and data sub-streams may interleave
/// across PDUs; each sub-stream completes when a fragment with the
/// last-fragment bit arrives.
#[derive(Debug, Default)]
pub struct PDataAssembler {
    command: Vec<u8>,
    command_context: Option<u8>,
    data: Vec<u8>,
    data_context: Option<u8>,
}

impl PDataAssembler {
    /// Create an empty assembler.
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed the PDVs of one P-DATA-TF PDU into the assembler,
    /// returning any streams completed by them, in arrival order.
    pub fn feed(&mut self, values: Vec<PDataValue>) -> Vec<AssembledStream> {
        let mut completed = Vec::new();
        for pdv in values {
            match pdv.value_type {
                PDataValueType::Command => {
                    self.command_context.get_or_insert(pdv.presentation_context_id);
                    self.command.extend_from_slice(&pdv.data);
                    if pdv.is_last {
                        completed.push(AssembledStream {
                            presentation_context_id: self
                                .command_context
                                .take()
                                .unwrap_or(pdv.presentation_context_id),
                            value_type: PDataValueType::Command,
                            data: std::mem::take(&mut self.command),
                        });
                    }
                }
                PDataValueType::Data => {
                    self.data_context.get_or_insert(pdv.presentation_context_id);
                    self.data.extend_from_slice(&pdv.data);
                    if pdv.is_last {
                        completed.push(AssembledStream {
                            presentation_context_id: self
                                .data_context
                                .take()
                                .unwrap_or(pdv.presentation_context_id),
                            value_type: PDataValueType::Data,
                            data: std::mem::take(&mut self.data),
                        });
                    }
                }
            }
        }
        completed
    }

    /// Whether a partial stream is pending reassembly.
    pub fn has_pending(&self) -> bool {
        !self.command.is_empty() || !self.data.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdu::MINIMUM_PDU_SIZE;

    #[test]
    fn small_payload_is_one_last_fragment() {
        let pdus = split_into_pdus(3, PDataValueType::Command, &[1, 2, 3], MINIMUM_PDU_SIZE);
        assert_eq!(pdus.len(), 1);
        match &pdus[0] {
            Pdu::PData { data } => {
                assert_eq!(data.len(), 1);
                assert!(data[0].is_last);
                assert_eq!(data[0].presentation_context_id, 3);
                assert_eq!(data[0].value_type, PDataValueType::Command);
                assert_eq!(data[0].data, vec![1, 2, 3]);
            }
            other => panic!("expected P-DATA, got {:?}", other),
        }
    }

    #[test]
    fn large_payload_is_split_and_reassembled() {
        let payload: Vec<u8> = (0..10_000u32).map(|x| x as u8).collect();
        let pdus = split_into_pdus(1, PDataValueType::Data, &payload, MINIMUM_PDU_SIZE);
        assert!(pdus.len() > 1);

        let mut assembler = PDataAssembler::new();
        let mut streams = Vec::new();
        for pdu in pdus {
            match pdu {
                Pdu::PData { data } => streams.extend(assembler.feed(data)),
                other => panic!("expected P-DATA, got {:?}", other),
            }
        }
        assert_eq!(streams.len(), 1);
        assert_eq!(streams[0].data, payload);
        assert_eq!(streams[0].value_type, PDataValueType::Data);
        assert!(!assembler.has_pending());
    }

    #[test]
    fn fragments_fit_within_the_maximum_pdu_length() {
        let payload = vec![0u8; 9000];
        for pdu in split_into_pdus(1, PDataValueType::Data, &payload, MINIMUM_PDU_SIZE) {
            let mut bytes = Vec::new();
            crate::pdu::writer::write_pdu(&mut bytes, &pdu).unwrap();
            // PDU payload (total minus the 6-byte PDU header)
            assert!(bytes.len() as u32 - 6 <= MINIMUM_PDU_SIZE);
        }
    }

    #[test]
    fn interleaved_command_and_data_streams() {
        let mut assembler = PDataAssembler::new();
        let first = assembler.feed(vec![PDataValue {
            presentation_context_id: 5,
            value_type: PDataValueType::Command,
            is_last: false,
            data: vec![1, 2],
        }]);
        assert!(first.is_empty());
        let completed = assembler.feed(vec![
            PDataValue {
                presentation_context_id: 5,
                value_type: PDataValueType::Command,
                is_last: true,
                data: vec![3],
            },
            PDataValue {
                presentation_context_id: 5,
                value_type: PDataValueType::Data,
                is_last: true,
                data: vec![9, 9],
            },
        ]);
        assert_eq!(completed.len(), 2);
        assert_eq!(completed[0].data, vec![1, 2, 3]);
        assert_eq!(completed[1].data, vec![9, 9]);
    }
}
