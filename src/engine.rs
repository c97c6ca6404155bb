//! Validation and application of requested states.

use std::time::Duration;

use log::{info, warn};

use crate::controller::{ControllerHandle, Session};
use crate::errors::Error;
use crate::health;
use crate::link::{LinkCommand, LinkError};
use crate::state::{DeviceState, StateRequest};
use crate::triage;
use crate::types::{Mode, Percent};

type Result<T> = std::result::Result<T, Error>;

/// Validate `request` and realize it on `handle`'s bulb.
///
/// Checks run cheapest first and without I/O: a missing key, then the
/// mode's range rules. Only then is the link taken and the commands
/// pushed. A link failure is attributed, in order, to credentials (by
/// message), to connectivity (by a follow-up probe on the same link), or
/// else reported as a generic apply failure. Nothing is retried.
pub(crate) async fn apply(
    handle: &ControllerHandle,
    request: &StateRequest,
    link_timeout: Duration,
) -> Result<DeviceState> {
    if !handle.has_key() {
        return Err(Error::MissingCredential(handle.id().to_string()));
    }

    let state = request.validate()?;

    let mut session = handle.session().await;
    match push(&mut *session, &state, link_timeout).await {
        Ok(()) => {
            handle.record_state(state).await;
            handle.set_connected(true);
            info!("applied {} state to {}", state.mode(), handle.id());
            Ok(state)
        }
        Err(cause) => Err(attribute(handle, &mut *session, cause, link_timeout).await),
    }
}

/// Turn the bulb dark by pushing zero brightness.
///
/// The recorded state is kept, so a later restore brings the light back.
/// Failures are attributed exactly like those of [`apply`].
pub(crate) async fn power_off(handle: &ControllerHandle, link_timeout: Duration) -> Result<()> {
    if !handle.has_key() {
        return Err(Error::MissingCredential(handle.id().to_string()));
    }

    let mut session = handle.session().await;
    match session
        .send(LinkCommand::Brightness(Percent::zero()), link_timeout)
        .await
    {
        Ok(()) => {
            handle.set_connected(true);
            info!("powered off {}", handle.id());
            Ok(())
        }
        Err(cause) => Err(attribute(handle, &mut *session, cause, link_timeout).await),
    }
}

/// The command sequence realizing `state`: mode first, then values.
pub(crate) fn commands(state: &DeviceState) -> Vec<LinkCommand> {
    match *state {
        DeviceState::White {
            brightness,
            temperature,
        } => vec![
            LinkCommand::SetMode(Mode::White),
            LinkCommand::Brightness(brightness),
            LinkCommand::Temperature(temperature),
        ],
        DeviceState::Colour { color } => vec![
            LinkCommand::SetMode(Mode::Colour),
            LinkCommand::Colour(color),
        ],
    }
}

async fn push(
    session: &mut Session,
    state: &DeviceState,
    limit: Duration,
) -> std::result::Result<(), LinkError> {
    for command in commands(state) {
        session.send(command, limit).await?;
    }
    Ok(())
}

async fn attribute(
    handle: &ControllerHandle,
    session: &mut Session,
    cause: LinkError,
    limit: Duration,
) -> Error {
    let id = handle.id();

    if triage::is_credential_failure(&cause) {
        warn!("authentication with {id} failed: {cause}");
        return Error::authentication(id, cause);
    }

    if !health::probe_session(id, session, limit).await {
        warn!("{id} became unreachable: {cause}");
        handle.set_connected(false);
        return Error::ConnectionLost(id.to_string());
    }

    warn!("applying state to {id} failed: {cause}");
    Error::apply_failed(id, cause)
}
