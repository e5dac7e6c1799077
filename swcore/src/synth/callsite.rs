use swinstr::{
    modules::{body::InstrId, body::MethodBody, instructions::Instr},
    types::{FieldRef, MethodRef},
};

use crate::utils::error::WeaveResult;

/// Registration run inserted after a handle-producing call. The helper takes
/// `(handle, container)` and hands the handle back, so the stack is the same
/// after the run as before it.
pub fn registration(field: &FieldRef, helper: &MethodRef) -> [Instr; 3] {
    [
        Instr::load_this(),
        Instr::LoadField(field.clone()),
        Instr::Call(helper.clone()),
    ]
}

/// Register the handle produced by each of `matches` into `field`. Returns
/// the number of registrations inserted.
pub fn register_matches(
    body: &mut MethodBody,
    field: &FieldRef,
    helper: &MethodRef,
    matches: &[InstrId],
) -> WeaveResult<usize> {
    for &call in matches {
        body.insert_after(call, registration(field, helper))?;
        log::trace!("registered handle produced by {call:?}");
    }
    Ok(matches.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{matcher::find_matches, tests_utils::models};

    #[test]
    fn registration_keeps_the_handle_on_the_stack() {
        let field = swinstr::types::FieldRef::new(
            models::model("Model"),
            models::tracker_name("Model"),
            models::container(),
        );
        let mut body = swinstr::modules::body::MethodBody::from_instrs(
            models::subscribe_into_probe()
                .into_iter()
                .chain(models::subscribe_into_probe())
                .chain([Instr::Ret]),
        );
        let before = body.verify_stack(false).unwrap();

        let matches = find_matches(&body, &models::disposable(), "Subscribe");
        let count = register_matches(&mut body, &field, &models::track_with(), &matches).unwrap();
        assert_eq!(count, 2);
        assert_eq!(body.len(), 11 + 6);

        // Each registration directly follows its call.
        for call in &matches {
            let next = body.next(*call).unwrap();
            assert_eq!(body.get(next), Some(&Instr::load_this()));
        }
        assert!(body.verify_stack(false).unwrap() >= before);
        assert_eq!(find_matches(&body, &models::disposable(), "Subscribe"), matches);
    }
}
