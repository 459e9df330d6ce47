//! Switching the AC between conditioning and fan-only.
//!
//! The AC keeps its compressor running long after the zones reach their setpoints, with the
//! spill zone taking the excess. Instead, once every powered zone is at its setpoint the AC is
//! switched to Fan, and back to the remembered Cool or Heat mode once the zone furthest from its
//! setpoint drifts past a tolerance.

use tracing::{debug, info};

use crate::protocol::{AcMode, GroupStatus, PowerState, status::ReportedMode};

/// In Fan mode (previously cooling) switch back to Cool once a zone is this much above its
/// setpoint.
pub const BACK_TO_COOL_TOLERANCE: f64 = 0.3;
/// In Fan mode (previously heating) switch back to Heat once a zone is this much below its
/// setpoint.
pub const BACK_TO_HEAT_TOLERANCE: f64 = -0.3;

/// The powered zone that is furthest from its setpoint in the direction the AC works against.
#[derive(Clone, Debug, PartialEq)]
pub struct FocusGroup {
    pub name: String,
    /// Current temperature minus the setpoint.
    pub differential: f64,
    pub temperature: f64,
}

/// Find the warmest zone relative to its setpoint when cooling, the coldest when heating.
///
/// Only zones that are on are considered. Returns `None` for modes other than Cool and Heat.
pub fn focus_group(groups: &[GroupStatus], conditioning: AcMode) -> Option<FocusGroup> {
    let candidates = groups.iter().filter(|g| g.power_state == PowerState::On).map(|g| {
        FocusGroup {
            name: g.name.clone(),
            differential: g.temperature - f64::from(g.target_setpoint),
            temperature: g.temperature,
        }
    });
    match conditioning {
        AcMode::Cool => candidates.reduce(|a, b| if b.differential > a.differential { b } else { a }),
        AcMode::Heat => candidates.reduce(|a, b| if b.differential < a.differential { b } else { a }),
        _ => None,
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Decision {
    /// Switch the AC to this mode.
    Switch(AcMode),
    Keep,
    /// The AC is in a mode this logic does not manage.
    Unsupported,
    /// The AC is in Fan mode and it is not known whether it was heating or cooling before.
    UnknownConditioning,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Plan {
    /// Mode to remember as the conditioning mode the AC was last in.
    pub remember: Option<AcMode>,
    pub focus: Option<FocusGroup>,
    pub decision: Decision,
}

/// Decide whether the AC should change mode.
///
/// `remembered` is the conditioning mode stored by an earlier run, if any.
pub fn decide(current: ReportedMode, remembered: Option<AcMode>, groups: &[GroupStatus]) -> Plan {
    let unchanged = |decision| Plan { remember: None, focus: None, decision };
    let (remember, conditioning) = match current.known() {
        Some(mode @ (AcMode::Cool | AcMode::Heat)) => (Some(mode), mode),
        Some(AcMode::Fan) => match remembered {
            Some(mode @ (AcMode::Cool | AcMode::Heat)) => (None, mode),
            _ => return unchanged(Decision::UnknownConditioning),
        },
        _ => {
            info!(message = "unsupported AC mode, not switching", mode = %current);
            return unchanged(Decision::Unsupported);
        }
    };
    let focus = focus_group(groups, conditioning);
    debug!(message = "focus group", ?focus, %conditioning);
    let fan = current.known() == Some(AcMode::Fan);
    // With no zone powered on there is nothing to condition for.
    let decision = match (&focus, fan, conditioning) {
        (None, false, _) => Decision::Switch(AcMode::Fan),
        (None, true, _) => Decision::Keep,
        (Some(f), false, AcMode::Cool) if f.differential <= 0.0 => Decision::Switch(AcMode::Fan),
        (Some(f), false, AcMode::Heat) if f.differential >= 0.0 => Decision::Switch(AcMode::Fan),
        (Some(f), true, AcMode::Cool) if f.differential >= BACK_TO_COOL_TOLERANCE => {
            Decision::Switch(AcMode::Cool)
        }
        (Some(f), true, AcMode::Heat) if f.differential <= BACK_TO_HEAT_TOLERANCE => {
            Decision::Switch(AcMode::Heat)
        }
        _ => Decision::Keep,
    };
    info!(message = "mode switching decision", ?decision, %current);
    Plan { remember, focus, decision }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn group(name: &str, power_state: PowerState, temperature: f64, target_setpoint: u8) -> GroupStatus {
        GroupStatus {
            name: name.to_string(),
            power_state,
            temperature,
            target_setpoint,
            ..Default::default()
        }
    }

    fn zones() -> Vec<GroupStatus> {
        vec![
            group("Living", PowerState::On, 22.5, 23),
            group("Bedroom", PowerState::On, 23.5, 23),
            group("Study", PowerState::Off, 30.0, 20),
        ]
    }

    #[test]
    fn focus_ignores_zones_that_are_off() {
        let focus = focus_group(&zones(), AcMode::Cool).unwrap();
        assert_eq!(focus.name, "Bedroom");
        assert_eq!(focus.differential, 0.5);
        let focus = focus_group(&zones(), AcMode::Heat).unwrap();
        assert_eq!(focus.name, "Living");
        assert_eq!(focus.differential, -0.5);
        assert_eq!(focus_group(&zones(), AcMode::Fan), None);
    }

    #[test]
    fn cooling_continues_while_a_zone_is_warm() {
        let plan = decide(ReportedMode::Known(AcMode::Cool), None, &zones());
        assert_eq!(plan.remember, Some(AcMode::Cool));
        assert_eq!(plan.decision, Decision::Keep);
    }

    #[test]
    fn cooling_stops_once_zones_are_at_setpoint() {
        let groups = [group("Living", PowerState::On, 22.0, 23), group("Bed", PowerState::On, 23.0, 23)];
        let plan = decide(ReportedMode::Known(AcMode::Cool), Some(AcMode::Heat), &groups);
        assert_eq!(plan.remember, Some(AcMode::Cool));
        assert_eq!(plan.decision, Decision::Switch(AcMode::Fan));
    }

    #[test]
    fn heating_stops_once_zones_are_at_setpoint() {
        let groups = [group("Living", PowerState::On, 21.0, 21)];
        let plan = decide(ReportedMode::Known(AcMode::Heat), None, &groups);
        assert_eq!(plan.decision, Decision::Switch(AcMode::Fan));
        let groups = [group("Living", PowerState::On, 20.5, 21)];
        let plan = decide(ReportedMode::Known(AcMode::Heat), None, &groups);
        assert_eq!(plan.decision, Decision::Keep);
    }

    #[test]
    fn fan_returns_to_remembered_mode_past_tolerance() {
        let fan = ReportedMode::Known(AcMode::Fan);
        let warm = [group("Living", PowerState::On, 23.5, 23)];
        let plan = decide(fan, Some(AcMode::Cool), &warm);
        assert_eq!(plan.remember, None);
        assert_eq!(plan.decision, Decision::Switch(AcMode::Cool));

        let barely_warm = [group("Living", PowerState::On, 23.2, 23)];
        assert_eq!(decide(fan, Some(AcMode::Cool), &barely_warm).decision, Decision::Keep);

        let cold = [group("Living", PowerState::On, 20.5, 21)];
        assert_eq!(decide(fan, Some(AcMode::Heat), &cold).decision, Decision::Switch(AcMode::Heat));
        assert_eq!(decide(fan, Some(AcMode::Cool), &cold).decision, Decision::Keep);
    }

    #[test]
    fn nothing_on() {
        let groups = [group("Study", PowerState::Off, 30.0, 20)];
        let cool = ReportedMode::Known(AcMode::Cool);
        assert_eq!(decide(cool, None, &groups).decision, Decision::Switch(AcMode::Fan));
        let fan = ReportedMode::Known(AcMode::Fan);
        assert_eq!(decide(fan, Some(AcMode::Cool), &groups).decision, Decision::Keep);
    }

    #[test]
    fn modes_left_alone() {
        assert_eq!(decide(ReportedMode::Other(0), None, &zones()).decision, Decision::Unsupported);
        assert_eq!(
            decide(ReportedMode::Known(AcMode::Fan), None, &zones()).decision,
            Decision::UnknownConditioning
        );
    }
}
