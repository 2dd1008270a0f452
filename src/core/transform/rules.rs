use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use arrow::array::{
    ArrayRef, BooleanArray, Datum, Float64Array, Int64Array, ListBuilder, Scalar, StringArray,
    StringBuilder,
};
use arrow::compute::kernels::boolean::is_not_null;
use arrow::compute::kernels::cmp::{gt, lt, lt_eq};
use arrow::compute::kernels::nullif::nullif;
use arrow::compute::kernels::zip::zip;
use arrow::datatypes::{DataType, Float64Type};
use tracing::debug;

use super::text::{clean_text, title_case};
use crate::core::frame::{
    as_floats, as_ints, as_lists, as_strings, cast_lenient, fill_null, list_of, map_strings, MovieFrame,
};
use crate::utils::ReelResult;

pub const MISSING_OVERVIEW: &str = "Sem sinopse";
pub const MISSING_ORIGINAL_TITLE: &str = "Titulo Original Ausente";
pub const MISSING_ORIGINAL_LANGUAGE: &str = "Indeterminado";
pub const UNKNOWN_COMPANY: &str = "Empresa Desconhecida";
pub const UNKNOWN_STATUS: &str = "Desconhecido";
pub const UNKNOWN_DIRECTOR: &str = "Diretor Desconhecido";

pub struct RuleContext<'a> {
    pub genres: &'a HashMap<i64, String>,
}

pub type Rule = fn(&mut MovieFrame, &RuleContext) -> ReelResult<()>;

fn float_scalar(v: f64) -> Scalar<Float64Array> {
    Scalar::new(Float64Array::from(vec![v]))
}

fn int_scalar(v: i64) -> Scalar<Int64Array> {
    Scalar::new(Int64Array::from(vec![v]))
}

fn text_scalar(v: &str) -> Scalar<StringArray> {
    Scalar::new(StringArray::from(vec![v]))
}

/// NaN and infinities become null.
fn finite_or_null(array: &ArrayRef) -> ReelResult<ArrayRef> {
    let not_finite: BooleanArray = as_floats(array)?.iter().map(|v| v.map(|f| !f.is_finite())).collect();
    Ok(nullif(array.as_ref(), &not_finite)?)
}

fn positive_or_null(array: &ArrayRef) -> ReelResult<ArrayRef> {
    let non_positive = lt_eq(array, &int_scalar(0))?;
    Ok(nullif(array.as_ref(), &non_positive)?)
}

fn clip_below(array: &ArrayRef, floor: &dyn Datum) -> ReelResult<ArrayRef> {
    let below = lt(array, floor)?;
    Ok(zip(&below, floor, array)?)
}

fn clip_above(array: &ArrayRef, ceiling: &dyn Datum) -> ReelResult<ArrayRef> {
    let above = gt(array, ceiling)?;
    Ok(zip(&above, ceiling, array)?)
}

/// Cast to text, trim and NFC-normalize; blank becomes null.
fn text_column(frame: &MovieFrame, name: &str) -> ReelResult<ArrayRef> {
    let text = cast_lenient(&frame.column_or_nulls(name), &DataType::Utf8)?;
    map_strings(&text, clean_text)
}

fn text_with_default(frame: &mut MovieFrame, name: &str, fallback: &str) -> ReelResult<()> {
    let text = fill_null(&text_column(frame, name)?, &text_scalar(fallback))?;
    frame.set_column(name, text)
}

/// Cast to a list of text; a missing list becomes empty and every blank name becomes `fallback`.
fn name_list_with_default(frame: &mut MovieFrame, name: &str, fallback: &str) -> ReelResult<()> {
    let lists = cast_lenient(&frame.column_or_nulls(name), &list_of(DataType::Utf8))?;
    let mut builder = ListBuilder::new(StringBuilder::new());
    for row in as_lists(&lists)?.iter() {
        if let Some(names) = row {
            for item in as_strings(&names)?.iter() {
                let cleaned = item.and_then(clean_text);
                builder.values().append_value(cleaned.as_deref().unwrap_or(fallback));
            }
        }
        builder.append(true);
    }
    frame.set_column(name, Arc::new(builder.finish()))
}

pub fn clean_ids(frame: &mut MovieFrame, _ctx: &RuleContext) -> ReelResult<()> {
    let ids = cast_lenient(&frame.column_or_nulls("id"), &DataType::Int64)?;
    let mut seen = HashSet::new();
    let keep: BooleanArray = as_ints(&ids)?
        .iter()
        .map(|id| Some(id.is_some_and(|id| seen.insert(id))))
        .collect();
    frame.set_column("id", ids)?;

    let dropped = frame.retain_rows(&keep)?;
    if dropped > 0 {
        debug!(dropped, "Dropped rows with a missing or repeated id");
    }
    Ok(())
}

pub fn clean_titles(frame: &mut MovieFrame, _ctx: &RuleContext) -> ReelResult<()> {
    let titles = text_column(frame, "title")?;
    let present = is_not_null(titles.as_ref())?;
    frame.set_column("title", titles)?;

    let dropped = frame.retain_rows(&present)?;
    if dropped > 0 {
        debug!(dropped, "Dropped rows without a title");
    }

    let cased = map_strings(&frame.column_or_nulls("title"), |s| Some(title_case(s)))?;
    frame.set_column("title", cased)
}

/// `genre_ids` (ids) becomes `genres` (names), at the same position.
pub fn map_genres(frame: &mut MovieFrame, ctx: &RuleContext) -> ReelResult<()> {
    let ids = cast_lenient(&frame.column_or_nulls("genre_ids"), &list_of(DataType::Int64))?;
    let mut builder = ListBuilder::new(StringBuilder::new());
    for row in as_lists(&ids)?.iter() {
        if let Some(values) = row {
            // ids that did not cast are null here and are skipped
            for id in as_ints(&values)?.iter().flatten() {
                match ctx.genres.get(&id) {
                    Some(name) => builder.values().append_value(name),
                    None => builder.values().append_value(id.to_string()),
                }
            }
        }
        builder.append(true);
    }
    frame.replace_column("genre_ids", "genres", Arc::new(builder.finish()))
}

pub fn parse_release_dates(frame: &mut MovieFrame, _ctx: &RuleContext) -> ReelResult<()> {
    let text = text_column(frame, "release_date")?;
    let dates = cast_lenient(&text, &DataType::Date32)?;
    frame.set_column("release_date", dates)
}

pub fn clean_popularity(frame: &mut MovieFrame, _ctx: &RuleContext) -> ReelResult<()> {
    let popularity = cast_lenient(&frame.column_or_nulls("popularity"), &DataType::Float64)?;
    let popularity = fill_null(&finite_or_null(&popularity)?, &float_scalar(0.0))?;
    let rounded = as_floats(&popularity)?.unary::<_, Float64Type>(|f| (f * 100.0).round() / 100.0);
    frame.set_column("popularity", Arc::new(rounded))
}

pub fn clean_votes(frame: &mut MovieFrame, _ctx: &RuleContext) -> ReelResult<()> {
    let average = cast_lenient(&frame.column_or_nulls("vote_average"), &DataType::Float64)?;
    let average = fill_null(&finite_or_null(&average)?, &float_scalar(0.0))?;
    let average = clip_above(&clip_below(&average, &float_scalar(0.0))?, &float_scalar(10.0))?;
    frame.set_column("vote_average", average)?;

    let count = cast_lenient(&frame.column_or_nulls("vote_count"), &DataType::Int64)?;
    let count = clip_below(&fill_null(&count, &int_scalar(0))?, &int_scalar(0))?;
    frame.set_column("vote_count", count)
}

pub fn clean_overview(frame: &mut MovieFrame, _ctx: &RuleContext) -> ReelResult<()> {
    text_with_default(frame, "overview", MISSING_OVERVIEW)
}

/// Zero budget/revenue means "not reported" in TMDB; keep it as unknown.
pub fn clean_finances(frame: &mut MovieFrame, _ctx: &RuleContext) -> ReelResult<()> {
    for name in ["budget", "revenue"] {
        let amounts = cast_lenient(&frame.column_or_nulls(name), &DataType::Int64)?;
        frame.set_column(name, positive_or_null(&amounts)?)?;
    }
    Ok(())
}

pub fn clean_runtime(frame: &mut MovieFrame, _ctx: &RuleContext) -> ReelResult<()> {
    let minutes = cast_lenient(&frame.column_or_nulls("runtime"), &DataType::Int64)?;
    frame.set_column("runtime", positive_or_null(&minutes)?)
}

pub fn clean_original_fields(frame: &mut MovieFrame, _ctx: &RuleContext) -> ReelResult<()> {
    text_with_default(frame, "original_title", MISSING_ORIGINAL_TITLE)?;
    text_with_default(frame, "original_language", MISSING_ORIGINAL_LANGUAGE)
}

pub fn clean_production_companies(frame: &mut MovieFrame, _ctx: &RuleContext) -> ReelResult<()> {
    name_list_with_default(frame, "production_companies", UNKNOWN_COMPANY)
}

pub fn clean_status(frame: &mut MovieFrame, _ctx: &RuleContext) -> ReelResult<()> {
    text_with_default(frame, "status", UNKNOWN_STATUS)?;
    let cased = map_strings(&frame.column_or_nulls("status"), |s| Some(title_case(s)))?;
    frame.set_column("status", cased)
}

pub fn clean_directors(frame: &mut MovieFrame, _ctx: &RuleContext) -> ReelResult<()> {
    name_list_with_default(frame, "directors", UNKNOWN_DIRECTOR)
}

pub fn clean_image_paths(frame: &mut MovieFrame, _ctx: &RuleContext) -> ReelResult<()> {
    for name in ["poster_path", "backdrop_path"] {
        let path = text_column(frame, name)?;
        frame.set_column(name, path)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::frame::tests::{frame_of, values};
    use arrow::array::Array;
    use serde_json::{json, Value};

    fn apply(rule: Rule, f: &mut MovieFrame) {
        let genres = HashMap::from([(28, "Ação".to_string()), (18, "Drama".to_string())]);
        rule(f, &RuleContext { genres: &genres }).unwrap();
    }

    fn dtype(f: &MovieFrame, name: &str) -> DataType {
        f.column(name).unwrap().data_type().clone()
    }

    #[test]
    fn ids_drop_missing_and_duplicates() {
        let mut f = frame_of(
            &["id", "title"],
            json!([
                {"id": 1, "title": "a"},
                {"id": "2", "title": "b"},
                {"id": null, "title": "c"},
                {"id": "abc", "title": "d"},
                {"id": 1, "title": "e"}
            ]),
        );
        apply(clean_ids, &mut f);
        assert_eq!(values(&f, "id"), vec![json!(1), json!(2)]);
        assert_eq!(values(&f, "title"), vec![json!("a"), json!("b")]);
        assert_eq!(dtype(&f, "id"), DataType::Int64);
    }

    #[test]
    fn titles_are_required_and_title_cased() {
        let mut f = frame_of(
            &["id", "title"],
            json!([
                {"id": 1, "title": "  o iluminado "},
                {"id": 2, "title": "   "},
                {"id": 3, "title": null},
                {"id": 4, "title": 1917}
            ]),
        );
        apply(clean_titles, &mut f);
        assert_eq!(values(&f, "id"), vec![json!(1), json!(4)]);
        assert_eq!(values(&f, "title"), vec![json!("O Iluminado"), json!("1917")]);
    }

    #[test]
    fn genres_map_ids_to_names_in_place() {
        let mut f = frame_of(
            &["id", "genre_ids", "title"],
            json!([
                {"id": 1, "genre_ids": [28, 99], "title": "a"},
                {"id": 2, "genre_ids": null, "title": "b"},
                {"id": 3, "genre_ids": [18, "junk"], "title": "c"}
            ]),
        );
        apply(map_genres, &mut f);
        assert_eq!(f.column_names(), vec!["id", "genres", "title"]);
        assert_eq!(dtype(&f, "genres"), list_of(DataType::Utf8));
        assert_eq!(
            values(&f, "genres"),
            vec![json!(["Ação", "99"]), json!([]), json!(["Drama"])]
        );
    }

    #[test]
    fn release_dates_parse_or_null() {
        let mut f = frame_of(
            &["release_date"],
            json!([{"release_date": "2024-03-01"}, {"release_date": ""}, {"release_date": "01/03/2024"}]),
        );
        apply(parse_release_dates, &mut f);
        assert_eq!(dtype(&f, "release_date"), DataType::Date32);
        assert_eq!(values(&f, "release_date"), vec![json!("2024-03-01"), Value::Null, Value::Null]);
    }

    #[test]
    fn popularity_is_filled_and_rounded() {
        let mut f = frame_of(
            &["popularity"],
            json!([{"popularity": 123.4567}, {"popularity": null}, {"popularity": "x"}, {"popularity": 7}]),
        );
        apply(clean_popularity, &mut f);
        assert_eq!(dtype(&f, "popularity"), DataType::Float64);
        let popularity = as_floats(f.column("popularity").unwrap()).unwrap();
        assert_eq!(popularity.values().to_vec(), vec![123.46, 0.0, 0.0, 7.0]);
        assert_eq!(popularity.null_count(), 0);
    }

    #[test]
    fn votes_are_clipped() {
        let mut f = frame_of(
            &["vote_average", "vote_count"],
            json!([
                {"vote_average": 11.2, "vote_count": -5},
                {"vote_average": -1.0, "vote_count": null},
                {"vote_average": null, "vote_count": "12"},
                {"vote_average": 7.5, "vote_count": 300}
            ]),
        );
        apply(clean_votes, &mut f);
        let average = as_floats(f.column("vote_average").unwrap()).unwrap();
        assert_eq!(average.values().to_vec(), vec![10.0, 0.0, 0.0, 7.5]);
        assert_eq!(values(&f, "vote_count"), vec![json!(0), json!(0), json!(12), json!(300)]);
    }

    #[test]
    fn overview_gets_placeholder() {
        let mut f = frame_of(
            &["overview"],
            json!([{"overview": " Um filme. "}, {"overview": ""}, {"overview": null}]),
        );
        apply(clean_overview, &mut f);
        assert_eq!(
            values(&f, "overview"),
            vec![json!("Um filme."), json!(MISSING_OVERVIEW), json!(MISSING_OVERVIEW)]
        );
    }

    #[test]
    fn finances_and_runtime_treat_non_positive_as_unknown() {
        let mut f = frame_of(
            &["budget", "revenue", "runtime"],
            json!([
                {"budget": 0, "revenue": null, "runtime": 0},
                {"budget": -10, "revenue": 1, "runtime": 142},
                {"budget": 5000000, "revenue": 0, "runtime": null},
                {"budget": "7", "revenue": 2.9, "runtime": "-3"}
            ]),
        );
        apply(clean_finances, &mut f);
        apply(clean_runtime, &mut f);
        assert_eq!(values(&f, "budget"), vec![Value::Null, Value::Null, json!(5000000), json!(7)]);
        assert_eq!(values(&f, "revenue"), vec![Value::Null, json!(1), Value::Null, json!(2)]);
        assert_eq!(values(&f, "runtime"), vec![Value::Null, json!(142), Value::Null, Value::Null]);
        assert_eq!(dtype(&f, "runtime"), DataType::Int64);
    }

    #[test]
    fn original_fields_get_placeholders() {
        let mut f = frame_of(
            &["original_title", "original_language"],
            json!([
                {"original_title": " Seven ", "original_language": ""},
                {"original_title": null, "original_language": "en"}
            ]),
        );
        apply(clean_original_fields, &mut f);
        assert_eq!(values(&f, "original_title"), vec![json!("Seven"), json!(MISSING_ORIGINAL_TITLE)]);
        assert_eq!(values(&f, "original_language"), vec![json!(MISSING_ORIGINAL_LANGUAGE), json!("en")]);
    }

    #[test]
    fn name_lists_are_cleaned() {
        let mut f = frame_of(
            &["production_companies", "directors"],
            json!([
                {"production_companies": [" Pixar ", "", null], "directors": ["Greta Gerwig "]},
                {"production_companies": null, "directors": "not a list"}
            ]),
        );
        apply(clean_production_companies, &mut f);
        apply(clean_directors, &mut f);
        assert_eq!(
            values(&f, "production_companies"),
            vec![json!(["Pixar", UNKNOWN_COMPANY, UNKNOWN_COMPANY]), json!([])]
        );
        assert_eq!(values(&f, "directors"), vec![json!(["Greta Gerwig"]), json!([])]);
    }

    #[test]
    fn status_is_defaulted_and_title_cased() {
        let mut f = frame_of(
            &["status"],
            json!([{"status": "released"}, {"status": " "}, {"status": "POST PRODUCTION"}]),
        );
        apply(clean_status, &mut f);
        assert_eq!(
            values(&f, "status"),
            vec![json!("Released"), json!(UNKNOWN_STATUS), json!("Post Production")]
        );
    }

    #[test]
    fn image_paths_blank_to_null() {
        let mut f = frame_of(
            &["poster_path", "backdrop_path"],
            json!([
                {"poster_path": "/p.jpg", "backdrop_path": null},
                {"poster_path": "", "backdrop_path": " /b.jpg "}
            ]),
        );
        apply(clean_image_paths, &mut f);
        assert_eq!(values(&f, "poster_path"), vec![json!("/p.jpg"), Value::Null]);
        assert_eq!(values(&f, "backdrop_path"), vec![Value::Null, json!("/b.jpg")]);
    }

    #[test]
    fn missing_columns_get_defaults() {
        let mut f = frame_of(&["id"], json!([{"id": 1}]));
        apply(clean_overview, &mut f);
        apply(clean_directors, &mut f);
        assert_eq!(values(&f, "overview"), vec![json!(MISSING_OVERVIEW)]);
        assert_eq!(values(&f, "directors"), vec![json!([])]);
        assert_eq!(dtype(&f, "directors"), list_of(DataType::Utf8));
    }
}
