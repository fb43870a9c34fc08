/// Returns `value` if it lies within `min..=max`, otherwise logs and returns `default`.
pub fn validate_range<T>(name: &'static str, value: T, min: T, max: T, default: T) -> T
where
    T: Copy + PartialOrd + Into<i32>,
{
    if (min..=max).contains(&value) {
        value
    } else {
        let (v, lo, hi, d): (i32, i32, i32, i32) =
            (value.into(), min.into(), max.into(), default.into());
        warn!("{} = {} is outside {}..={}, using {}", name, v, lo, hi, d);
        default
    }
}
