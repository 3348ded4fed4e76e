//! Block light: emitted by blocks, absorbed by opacity, blocked by face shapes.

use steel_utils::{Direction, SELF_SOURCE, block_pos, section_pos};

use super::{LightGraph, LightRules, MAX_LEVEL, direction_between};
use crate::block_state::LightLayer;
use crate::propagator::LevelPropagator;

/// Rules for block light.
#[derive(Debug, Clone, Copy, Default)]
pub struct BlockLightRules;

impl LightRules for BlockLightRules {
    const LAYER: LightLayer = LightLayer::Block;

    fn compute_level_from_neighbor(
        graph: &mut LightGraph<'_, Self>,
        source: i64,
        target: i64,
        level: u8,
    ) -> u8 {
        if target == SELF_SOURCE {
            return MAX_LEVEL;
        }
        if source == SELF_SOURCE {
            return level + MAX_LEVEL - graph.light_emission(target);
        }
        if level >= MAX_LEVEL {
            return level;
        }
        let dir = direction_between(source, target);
        let (target_state, opacity) = graph.state_and_opacity(target);
        if opacity >= MAX_LEVEL {
            return MAX_LEVEL;
        }
        let (source_state, _) = graph.state_and_opacity(source);
        if source_state.occludes_face(dir, &target_state) {
            return MAX_LEVEL;
        }
        level + opacity.max(1)
    }

    fn get_computed_level(
        graph: &mut LightGraph<'_, Self>,
        id: i64,
        excluded: i64,
        max_level: u8,
    ) -> u8 {
        let mut best = max_level;
        if excluded != SELF_SOURCE {
            best = best.min(Self::compute_level_from_neighbor(graph, SELF_SOURCE, id, 0));
            if best == 0 {
                return best;
            }
        }
        for dir in Direction::ALL {
            let neighbor = block_pos::offset_dir(id, dir);
            if neighbor == excluded {
                continue;
            }
            if let Some(level) = graph.stored_level(neighbor) {
                best = best.min(Self::compute_level_from_neighbor(graph, neighbor, id, level));
                if best == 0 {
                    return best;
                }
            }
        }
        best
    }

    fn check_neighbors_after_update(
        graph: &mut LightGraph<'_, Self>,
        propagator: &mut LevelPropagator,
        id: i64,
        level: u8,
        decrease: bool,
    ) {
        let section = section_pos::block_to_section(id);
        for dir in Direction::ALL {
            let neighbor = block_pos::offset_dir(id, dir);
            let neighbor_section = section_pos::block_to_section(neighbor);
            if section == neighbor_section
                || graph.storage().storing_light_for_section(neighbor_section)
            {
                propagator.check_neighbor(graph, id, neighbor, level, decrease);
            }
        }
    }
}
