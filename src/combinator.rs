use crate::context::{BacktrackPoint, MatchResult, MatchingContext};
use crate::node::Node;

/// State tag of the point an alternation leaves for its right branch.
const TRY_RIGHT: usize = 0;

impl Node {
    /// Matches this operator at `position`.
    ///
    /// On success the context carries the captures recorded by the match and
    /// every backtrack point the operator is willing to let an enclosing
    /// failure retry. On failure the context is left as it was on entry.
    pub fn match_at<'a>(&'a self, ctx: &mut MatchingContext<'a>, position: usize) -> MatchResult {
        match self {
            Node::Sequence(children) => match_sequence(children, ctx, position, 0),
            Node::Alternation(left, right) => self.match_alternation(left, right, ctx, position),
            Node::Quantifier { child, min, max } => {
                let snapshot = ctx.snapshot();
                match self.repeat_from(child, *min, *max, ctx, 0, position) {
                    MatchResult::Success(end) => MatchResult::Success(end),
                    MatchResult::Failure => {
                        ctx.restore(&snapshot);
                        MatchResult::Failure
                    }
                }
            }
            Node::Group { child, index } => {
                let snapshot = ctx.snapshot();
                ctx.open_group(*index, position);
                match child.match_at(ctx, position) {
                    MatchResult::Success(end) => {
                        ctx.set_capture(*index, position, end);
                        MatchResult::Success(end)
                    }
                    MatchResult::Failure => {
                        ctx.restore(&snapshot);
                        MatchResult::Failure
                    }
                }
            }
            Node::AtomicGroup(child) => {
                let snapshot = ctx.snapshot();
                let checkpoint = ctx.backtrack_depth();
                match child.match_at(ctx, position) {
                    MatchResult::Success(end) => {
                        ctx.discard_backtracks_from(checkpoint);
                        MatchResult::Success(end)
                    }
                    MatchResult::Failure => {
                        ctx.restore(&snapshot);
                        MatchResult::Failure
                    }
                }
            }
            Node::PositiveLookahead(child) => {
                let snapshot = ctx.snapshot();
                let result = child.match_at(ctx, position);
                ctx.restore(&snapshot);
                match result {
                    MatchResult::Success(_) => MatchResult::Success(position),
                    MatchResult::Failure => MatchResult::Failure,
                }
            }
            Node::PositiveLookbehind { child, length } => {
                let Some(from) = position.checked_sub(*length) else {
                    return MatchResult::Failure;
                };
                let snapshot = ctx.snapshot();
                let result = child.match_at(ctx, from);
                ctx.restore(&snapshot);
                match result {
                    MatchResult::Success(end) if end == position => MatchResult::Success(position),
                    _ => MatchResult::Failure,
                }
            }
            Node::Negation(child) => {
                let zero_width = child.is_zero_width();
                if !zero_width && position >= ctx.len() {
                    return MatchResult::Failure;
                }
                let snapshot = ctx.snapshot();
                let result = child.match_at(ctx, position);
                ctx.restore(&snapshot);
                match result {
                    MatchResult::Success(_) => MatchResult::Failure,
                    MatchResult::Failure if zero_width => MatchResult::Success(position),
                    MatchResult::Failure => MatchResult::Success(position + 1),
                }
            }
            _ => self.match_leaf(ctx, position),
        }
    }

    /// Re-attempts the alternative suspended in `point`. The caller has
    /// already restored `point.snapshot`.
    ///
    /// If this node owns the point it applies its own resume logic. Otherwise
    /// the point belongs to a node below this one: the resume is routed down
    /// to the child holding the owner, and on the way back up this node
    /// continues its own match from wherever the child now ends.
    pub fn resume<'a>(&'a self, ctx: &mut MatchingContext<'a>, point: &BacktrackPoint<'a>) -> MatchResult {
        if std::ptr::eq(self, point.owner) {
            return self.resume_own(ctx, point.position, point.state);
        }
        match self {
            Node::Sequence(children) => {
                let Some(index) = children.iter().position(|c| c.owns(point.owner)) else {
                    return MatchResult::Failure;
                };
                match children[index].resume(ctx, point) {
                    MatchResult::Success(next) => match_sequence(children, ctx, next, index + 1),
                    MatchResult::Failure => MatchResult::Failure,
                }
            }
            Node::Alternation(left, right) => {
                if left.owns(point.owner) {
                    left.resume(ctx, point)
                } else if right.owns(point.owner) {
                    right.resume(ctx, point)
                } else {
                    MatchResult::Failure
                }
            }
            Node::Quantifier { child, min, max } => {
                let Some(frame) = ctx.loop_frame(self) else {
                    return MatchResult::Failure;
                };
                match child.resume(ctx, point) {
                    // A repetition that now ends where it started is not
                    // progress; the "stop after count" point below covers it.
                    MatchResult::Success(next) if next != frame.start => {
                        self.repeat_from(child, *min, *max, ctx, frame.count + 1, next)
                    }
                    _ => MatchResult::Failure,
                }
            }
            Node::Group { child, index } => {
                let Some(start) = ctx.group_start(*index) else {
                    return MatchResult::Failure;
                };
                match child.resume(ctx, point) {
                    MatchResult::Success(end) => {
                        ctx.set_capture(*index, start, end);
                        MatchResult::Success(end)
                    }
                    MatchResult::Failure => MatchResult::Failure,
                }
            }
            // Atomic groups and lookarounds never let points from inside them
            // survive, so nothing can be routed through them.
            _ => MatchResult::Failure,
        }
    }

    fn resume_own<'a>(&'a self, ctx: &mut MatchingContext<'a>, position: usize, state: usize) -> MatchResult {
        match self {
            Node::Alternation(_, right) if state == TRY_RIGHT => right.match_at(ctx, position),
            Node::Quantifier { min, .. } if state >= *min => MatchResult::Success(position),
            _ => MatchResult::Failure,
        }
    }

    fn match_alternation<'a>(
        &'a self,
        left: &'a Node,
        right: &'a Node,
        ctx: &mut MatchingContext<'a>,
        position: usize,
    ) -> MatchResult {
        let snapshot = ctx.snapshot();
        // Pushed before the left branch runs so that points the left branch
        // leaves behind are retried before the right branch.
        ctx.push_backtrack(BacktrackPoint::new(self, position, snapshot.clone(), TRY_RIGHT));
        match left.match_at(ctx, position) {
            MatchResult::Success(end) => MatchResult::Success(end),
            MatchResult::Failure => {
                ctx.restore(&snapshot);
                right.match_at(ctx, position)
            }
        }
    }

    /// Greedy repetition starting with `count` repetitions already done and
    /// the next one due at `position`.
    ///
    /// Before each further repetition it leaves a point meaning "stop after
    /// `count`" (once `count >= min`), so choice points inside a repetition
    /// are retried before the count shrinks.
    fn repeat_from<'a>(
        &'a self,
        child: &'a Node,
        min: usize,
        max: Option<usize>,
        ctx: &mut MatchingContext<'a>,
        mut count: usize,
        mut position: usize,
    ) -> MatchResult {
        while max.map_or(true, |max| count < max) {
            let before = ctx.snapshot();
            if count >= min {
                ctx.push_backtrack(BacktrackPoint::new(self, position, before.clone(), count));
            }
            ctx.enter_loop(self, count, position);
            match child.match_at(ctx, position) {
                MatchResult::Success(next) if next != position => {
                    count += 1;
                    position = next;
                }
                _ => {
                    ctx.restore(&before);
                    break;
                }
            }
        }
        if count < min {
            MatchResult::Failure
        } else {
            MatchResult::Success(position)
        }
    }
}

/// Matches `children[index..]` from `position`.
///
/// When the rest of the sequence fails after `children[index]` succeeded, the
/// points `children[index]` left behind are drained here: each is resumed and
/// the rest re-run from the new position. Points below the depth recorded
/// before the child ran belong to an earlier child or an enclosing node and
/// are left alone.
fn match_sequence<'a>(
    children: &'a [Node],
    ctx: &mut MatchingContext<'a>,
    position: usize,
    index: usize,
) -> MatchResult {
    let Some(child) = children.get(index) else {
        return MatchResult::Success(position);
    };
    let snapshot = ctx.snapshot();
    let checkpoint = ctx.backtrack_depth();

    let MatchResult::Success(next) = child.match_at(ctx, position) else {
        ctx.restore(&snapshot);
        return MatchResult::Failure;
    };
    if let MatchResult::Success(end) = match_sequence(children, ctx, next, index + 1) {
        return MatchResult::Success(end);
    }

    while ctx.backtrack_depth() > checkpoint {
        let Some(point) = ctx.pop_backtrack() else {
            break;
        };
        if !child.owns(point.owner) {
            ctx.push_backtrack(point);
            break;
        }
        ctx.restore(&point.snapshot);
        if let MatchResult::Success(next) = child.resume(ctx, &point) {
            if let MatchResult::Success(end) = match_sequence(children, ctx, next, index + 1) {
                return MatchResult::Success(end);
            }
        }
    }

    ctx.restore(&snapshot);
    MatchResult::Failure
}
