//! Prompt and response-schema construction.
//!
//! Prompts are plain text; schemas use the uppercase type names of the
//! Gemini structured-output dialect.

use std::fmt::Write;

use serde_json::{Value, json};

use super::{CustomerProfile, EffectiveConfig};

/// Full extraction prompt for one drawing.
pub fn extraction_prompt(config: &EffectiveConfig) -> String {
    let additions = config.prompt_additions();
    let mut prompt = String::from(
        "Extract manufacturing data from the technical drawing PDF.\n\
         \n\
         EXTRACT:\n\
         1. Surface treatment (highest priority, check the BOM first)\n\
         2. Holes (tapped holes and toleranced holes)\n\
         3. Toleranced length dimensions\n\
         4. Material\n\
         5. BOM part numbers (if the drawing has a BOM table)\n\
         \n\
         RULES:\n\
         - Return exactly 1 item for this PDF\n\
         - Extract only what is clearly visible\n\
         - Use null if unsure\n\
         - Ignore general dimensions and metadata\n\
         \n\
         1. SURFACE TREATMENT:\n\
         - Scan the entire BOM table (bottom right) for coating keywords; the coating may appear in any cell\n\
         - Also check the title block and notes\n\
         - Answer with one of the surface treatments listed below, or \"None\"\n",
    );
    push_additions(&mut prompt, &additions.surface_treatment);

    prompt.push_str(
        "\n2. HOLES:\n\
         - Normal: \"Ø20\" or \"Ø20 H9\" -> type=normal, diameter=20, tolerance=H9\n\
         - Tapped: \"M6\" or \"4x M6\" -> type=tapped, threadSize=M6, count=4\n\
         - Reamed: pre-drill + final -> type=reamed, notes=\"Pre-drill Ø19.5\"\n\
         - The same hole at multiple locations gets a separate entry per location unless labeled \"2x\"\n",
    );
    push_additions(&mut prompt, &additions.holes);

    prompt.push_str(
        "\n3. TOLERANCED DIMENSIONS (lengths only):\n\
         - Tolerances on diameters (e.g. \"Ø40 H7\") belong to HOLES\n\
         - Only dimensions from the technical views with dimension lines, never from the BOM or notes\n\
         - Only dimensions with explicit tolerance symbols: ±, +0.1/-0.05, +1/0\n\
         - \"50±0.2\" -> dimension=50, upperTolerance=+0.2, lowerTolerance=-0.2\n\
         - \"32 +1/0\" -> dimension=32, upperTolerance=+1, lowerTolerance=0\n\
         - Reference dimensions in parentheses -> toleranceType=parenthesized\n",
    );
    push_additions(&mut prompt, &additions.tolerated_lengths);

    prompt.push_str(
        "\n4. MATERIAL:\n\
         - Read the complete material field including thickness: \"RVS 2 mm\", not \"RVS\"\n\
         - Generic shapes (\"Sheet\", \"Plaat\", \"Tube\", \"Buis\") are not materials; look in the same BOM row\n",
    );
    push_additions(&mut prompt, &additions.material);

    prompt.push_str(
        "\n5. BOM PART NUMBERS:\n\
         - If the drawing has a BOM table, list every part number from its part number column\n\
         - Leave out quantities, descriptions and the part number of this drawing itself\n\
         - Without a BOM table return []\n",
    );

    let _ = write!(prompt, "\nCustomer: {}\n", config.customer_name());
    push_rule_sections(&mut prompt, config);
    prompt.push_str("\nReturn valid JSON per schema. Use null for missing data.\n");
    prompt
}

/// BOM-only prompt for a second pass over the assembly drawing.
pub fn assembly_prompt(config: &EffectiveConfig) -> String {
    let mut prompt = String::from(
        "Extract manufacturing data from the technical drawing PDF.\n\
         \n\
         This PDF is the MAIN ASSEMBLY: focus only on the BOM and the title block.\n\
         Return material, surfaceTreatment and bomPartNumbers.\n\
         Do not extract holes or toleranced dimensions.\n",
    );
    let _ = write!(prompt, "\nCustomer: {}\n", config.customer_name());
    prompt.push_str("\nSurface treatments:\n");
    push_surface_treatments(&mut prompt, config);
    prompt.push_str("\nReturn valid JSON per schema.\n");
    prompt
}

/// Prompt asking which customer a drawing belongs to.
pub fn classification_prompt() -> String {
    let mut prompt = String::from(
        "You are analyzing a technical drawing PDF. Look at the BOM table in the bottom right corner \
         and the title block.\n\
         \n\
         Identify the customer name. Known customers:\n",
    );
    for profile in CustomerProfile::NAMED {
        let _ = writeln!(prompt, "- {}", profile.canonical_name());
    }
    prompt.push_str(
        "\nAnswer with the customer name exactly as listed above. If no customer can be identified \
         clearly, answer UNKNOWN.\n",
    );
    prompt
}

fn push_additions(prompt: &mut String, additions: &[String]) {
    if additions.is_empty() {
        return;
    }
    prompt.push_str("- Customer-specific rules:\n");
    for rule in additions {
        let _ = writeln!(prompt, "  - {rule}");
    }
}

fn push_rule_sections(prompt: &mut String, config: &EffectiveConfig) {
    prompt.push_str("\nTolerated length patterns:\n");
    if config.tolerance_patterns().is_empty() {
        prompt.push_str("(none)\n");
    }
    for (i, pattern) in config.tolerance_patterns().iter().enumerate() {
        match &pattern.description {
            Some(description) => {
                let _ = writeln!(prompt, "{}. {} ({description})", i + 1, pattern.pattern);
            }
            None => {
                let _ = writeln!(prompt, "{}. {}", i + 1, pattern.pattern);
            }
        }
    }

    prompt.push_str("\nHole patterns:\n");
    if config.hole_patterns().is_empty() {
        prompt.push_str("(none)\n");
    }
    for (i, recipe) in config.hole_patterns().iter().enumerate() {
        let capture = &recipe.capture;
        let fields: Vec<String> = [
            ("type", &capture.kind),
            ("diameter", &capture.diameter),
            ("threadSize", &capture.thread_size),
            ("tolerance", &capture.tolerance),
        ]
        .into_iter()
        .filter_map(|(name, value)| value.as_ref().map(|v| format!("{name}={v}")))
        .collect();

        if fields.is_empty() {
            let _ = writeln!(prompt, "{}. \"{}\"", i + 1, recipe.pattern);
        } else {
            let _ = writeln!(prompt, "{}. \"{}\" -> {}", i + 1, recipe.pattern, fields.join(", "));
        }
    }

    prompt.push_str("\nSurface treatments:\n");
    push_surface_treatments(prompt, config);

    prompt.push_str("\nMaterial patterns:\n");
    if config.material_hints().is_empty() {
        prompt.push_str("(none)\n");
    }
    for (pattern, hint) in config.material_hints() {
        let _ = writeln!(prompt, "- {pattern}: {hint}");
    }
}

fn push_surface_treatments(prompt: &mut String, config: &EffectiveConfig) {
    let options = config.surface_treatment_options();
    if options.is_empty() {
        prompt.push_str("(none)\n");
    }
    for (display, keywords) in options {
        if keywords.is_empty() {
            let _ = writeln!(prompt, "- {display}");
        } else {
            let _ = writeln!(prompt, "- {display} (keywords: {})", keywords.join(", "));
        }
    }
}

/// Response schema for extraction: an `items` envelope of drawing items.
pub fn drawing_schema() -> Value {
    let string = json!({"type": "STRING"});
    json!({
        "type": "OBJECT",
        "properties": {
            "items": {
                "type": "ARRAY",
                "items": {
                    "type": "OBJECT",
                    "properties": {
                        "partNumber": string,
                        "description": string,
                        "material": string,
                        "surfaceTreatment": string,
                        "notes": string,
                        "holes": {
                            "type": "ARRAY",
                            "items": {
                                "type": "OBJECT",
                                "properties": {
                                    "count": {"type": "INTEGER"},
                                    "type": string,
                                    "diameter": string,
                                    "threadSize": string,
                                    "tolerance": string,
                                    "upperTolerance": string,
                                    "lowerTolerance": string,
                                    "depth": string,
                                    "notes": string
                                }
                            }
                        },
                        "toleratedLengths": {
                            "type": "ARRAY",
                            "items": {
                                "type": "OBJECT",
                                "properties": {
                                    "dimension": string,
                                    "toleranceType": string,
                                    "upperTolerance": string,
                                    "lowerTolerance": string,
                                    "notes": string
                                }
                            }
                        },
                        "bomPartNumbers": {
                            "type": "ARRAY",
                            "items": string,
                            "description": "Part numbers from the BOM table, empty if there is no BOM"
                        }
                    }
                }
            }
        },
        "required": ["items"]
    })
}

/// Response schema for classification.
pub fn classification_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "customerName": {"type": "STRING"}
        },
        "required": ["customerName"]
    })
}
