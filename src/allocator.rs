use crate::error::AllocError;
use crate::submission::SubmissionId;

/// Compute the next submission ID from the rows currently in the sheet
///
/// The first row is the header. With no data rows the sequence starts at 1;
/// otherwise the first cell of the last row is parsed and incremented. A
/// last row whose ID cannot be parsed is an error rather than a guess.
///
/// # Arguments
/// * `rows` - Every row of the backing range, header included
///
/// # Returns
/// * `Result<SubmissionId, AllocError>` - The ID to assign to the new row
pub fn next_id(rows: &[Vec<String>]) -> Result<SubmissionId, AllocError> {
    let last = last_id(rows)?;
    last.checked_add(1)
        .map(SubmissionId)
        .ok_or(AllocError::Overflow { last })
}

/// Numeric ID of the last data row, or 0 when there is none.
pub fn last_id(rows: &[Vec<String>]) -> Result<u32, AllocError> {
    if rows.len() < 2 {
        return Ok(0);
    }

    let row = rows.len();
    let cell = rows[row - 1]
        .first()
        .map(|c| c.trim())
        .filter(|c| !c.is_empty())
        .ok_or(AllocError::MissingId { row })?;

    cell.parse::<u32>().map_err(|_| AllocError::NotNumeric {
        row,
        value: cell.to_string(),
    })
}

/// Keep a candidate ID ahead of the last one this process issued
///
/// The sheet is edited by hand, so its last row can fall behind an ID that
/// was already handed out. In that case the sequence resumes after
/// `last_issued`.
pub fn continue_after(
    candidate: SubmissionId,
    last_issued: Option<SubmissionId>,
) -> Result<SubmissionId, AllocError> {
    match last_issued {
        Some(previous) if candidate <= previous => {
            let next = previous
                .value()
                .checked_add(1)
                .map(SubmissionId)
                .ok_or(AllocError::Overflow {
                    last: previous.value(),
                })?;
            log::warn!(
                "Sheet is behind: its next id would be {} but {} was already issued, using {}",
                candidate,
                previous,
                next
            );
            Ok(next)
        }
        _ => Ok(candidate),
    }
}
