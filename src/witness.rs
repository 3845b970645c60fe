use crate::Error;
use bitcoin::secp256k1::schnorr;
use bitcoin::Witness;
use bitcoin::XOnlyPublicKey;
use std::collections::BTreeMap;

/// Arrange collected covenant signatures into the witness stack for a
/// script-path spend.
///
/// The slashing and unbonding scripts check the covenant multisignature
/// against the quorum keys compiled in descending byte order, so signatures
/// must be stacked in exactly that order. Keys without a collected signature
/// contribute an empty element, letting the signature-checking opcodes skip
/// absent signers positionally. The items of `original` (signature(s),
/// script, control block) follow the signature block unchanged.
///
/// The output always has `covenant_pks.len() + original.len()` elements,
/// however many signers actually responded. Whether the responses reach the
/// quorum threshold is not checked here.
pub fn compose_covenant_witness(
    original: &Witness,
    covenant_pks: &[XOnlyPublicKey],
    covenant_sigs: &BTreeMap<XOnlyPublicKey, schnorr::Signature>,
) -> Witness {
    let mut ordered_pks = covenant_pks.to_vec();
    ordered_pks.sort_by(|a, b| b.serialize().cmp(&a.serialize()));

    let mut items = Vec::with_capacity(ordered_pks.len() + original.len());

    for pk in &ordered_pks {
        match covenant_sigs.get(pk) {
            Some(sig) => items.push(sig.serialize().to_vec()),
            None => items.push(Vec::new()),
        }
    }

    for item in original.iter() {
        items.push(item.to_vec());
    }

    Witness::from_slice(&items)
}

/// Parse a covenant quorum key from its raw 32-byte protocol-parameter form.
pub fn covenant_key_from_slice(bytes: &[u8]) -> Result<XOnlyPublicKey, Error> {
    if bytes.len() != 32 {
        return Err(Error::invalid_public_key(format!(
            "covenant key must be 32 bytes, got {}",
            bytes.len()
        )));
    }

    XOnlyPublicKey::from_slice(bytes)
        .map_err(|e| Error::invalid_public_key(format!("bad covenant key: {e}")))
}
