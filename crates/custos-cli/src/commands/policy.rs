//! `custos policy`: print the signer requirement matrix

use anyhow::Result;
use custos_authorization::{required_signers, OperationClass, PolicyContext, SignerRequirement};

pub fn show(class: Option<&str>, guardians: usize, locked: bool, abandoned: bool) -> Result<()> {
    let ctx = PolicyContext {
        guardian_count: guardians,
        locked,
        recovery_abandoned: abandoned,
    };
    for (class, requirement) in rows(class, &ctx)? {
        println!("{class:<20} {requirement}");
    }
    Ok(())
}

fn rows(class: Option<&str>, ctx: &PolicyContext) -> Result<Vec<(OperationClass, SignerRequirement)>> {
    let classes = match class {
        Some(name) => vec![name.parse::<OperationClass>()?],
        None => OperationClass::ALL.to_vec(),
    };
    Ok(classes
        .into_iter()
        .map(|class| (class, required_signers(class, ctx)))
        .collect())
}
