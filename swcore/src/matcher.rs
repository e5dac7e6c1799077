//! Handle-producing call detection
//!
//! Detection is purely syntactic: an invoke instruction matches when the
//! method it calls returns the disposal contract and its full signature
//! contains the configured name fragment.
use swinstr::{
    modules::{body::InstrId, body::MethodBody, instructions::Instr},
    types::TypeRef,
};

pub fn is_handle_call(instr: &Instr, expected_return: &TypeRef, fragment: &str) -> bool {
    instr.invoked_method().is_some_and(|method| {
        method.return_type.as_ref() == Some(expected_return)
            && method.full_name().contains(fragment)
    })
}

/// Every handle-producing call of `body`, in body order.
pub fn find_matches(body: &MethodBody, expected_return: &TypeRef, fragment: &str) -> Vec<InstrId> {
    body.iter()
        .filter(|(_, instr)| is_handle_call(instr, expected_return, fragment))
        .map(|(id, _)| id)
        .collect()
}

#[cfg(test)]
mod tests {
    use swinstr::types::MethodRef;

    use super::*;
    use crate::tests_utils::models;

    #[test]
    fn matches_need_both_return_type_and_fragment() {
        let contract = models::disposable();
        let lookalike = MethodRef::new(models::model("Helpers"), "Subscribe")
            .static_()
            .returns(models::string());

        let body = MethodBody::from_instrs(
            models::subscribe_into_probe()
                .into_iter()
                .chain([
                    Instr::Call(lookalike),
                    Instr::Pop,
                    Instr::Call(models::never()),
                    Instr::Call(models::subscribe()),
                    Instr::Pop,
                    Instr::Ret,
                ]),
        );

        let matches = find_matches(&body, &contract, "Subscribe");
        let positions: Vec<_> = matches
            .iter()
            .map(|&id| body.position(id).unwrap())
            .collect();
        assert_eq!(positions, vec![3, 8]);
    }

    #[test]
    fn registration_calls_are_not_handle_calls() {
        let contract = models::disposable();
        assert!(!is_handle_call(
            &Instr::Call(models::track_with()),
            &contract,
            "Subscribe"
        ));
        assert!(is_handle_call(
            &Instr::CallVirt(models::subscribe()),
            &contract,
            "Subscribe"
        ));
        assert!(!is_handle_call(
            &Instr::NewObj(models::container_ctor()),
            &contract,
            ".ctor"
        ));
    }
}
