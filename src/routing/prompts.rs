//! Built-in system prompt variants and the class-to-prompt routing table.

use std::fmt;
use std::str::FromStr;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

const ORIGINAL_PROMPT: &str = r#"
Write a complete Python script using the python-pptx library to create a PowerPoint presentation (PPTX).
The script must:
- Use appropriate slide layouts (e.g., title slide, bullet slide).
- Save the presentation to a file named 'test.pptx'.
Output ONLY the Python code as plain text, without markdown, code block markers (e.g., ` + "```" + `python)

Example:
from pptx import Presentation
from pptx.util import Inches

prs = Presentation()
title_slide_layout = prs.slide_layouts[0]
slide = prs.slides.add_slide(title_slide_layout)
title = slide.shapes.title
subtitle = slide.placeholders[1]

title.text = "Hello, World!"
subtitle.text = "python-pptx was here!"

title_only_slide_layout = prs.slide_layouts[5]
slide = prs.slides.add_slide(title_only_slide_layout)
shapes = slide.shapes

shapes.title.text = 'Adding a Table'

rows = cols = 2
left = top = Inches(2.0)
width = Inches(6.0)
height = Inches(0.8)

table = shapes.add_table(rows, cols, left, top, width, height).table

# set column widths
table.columns[0].width = Inches(2.0)
table.columns[1].width = Inches(4.0)

# write column headings
table.cell(0, 0).text = 'Foo'
table.cell(0, 1).text = 'Bar'

# write body cells
table.cell(1, 0).text = 'Baz'
table.cell(1, 1).text = 'Qux'


bullet_slide_layout = prs.slide_layouts[1]

slide = prs.slides.add_slide(bullet_slide_layout)
shapes = slide.shapes

title_shape = shapes.title
body_shape = shapes.placeholders[1]

title_shape.text = 'Adding a Bullet Slide'

tf = body_shape.text_frame
tf.text = 'Find the bullet slide layout'

p = tf.add_paragraph()
p.text = 'Use _TextFrame.text for first bullet'
p.level = 1

p = tf.add_paragraph()
p.text = 'Use _TextFrame.add_paragraph() for subsequent bullets'
p.level = 2

prs.save('test.pptx')"#;

const DEFAULT_PROMPT: &str = r#"
Generate Python code for python-pptx presentation. OUTPUT MUST BE PURE PYTHON CODE ONLY.

CRITICAL:
- NO comments (# comment)
- NO explanations
- NO markdown (```python or ```)
- NO text outside code
- NO example usage
- NO instructions

REQUIREMENTS:
- Use python-pptx
- Create multiple slides with different layouts
- Save as 'test.pptx'
- Code must run without errors

VALID OUTPUT EXAMPLE:
from pptx import Presentation
prs = Presentation()
slide = prs.slides.add_slide(prs.slide_layouts[0])
slide.shapes.title.text = "Title"
prs.save('test.pptx')

NOW GENERATE PURE PYTHON CODE:"#;

const BASIC_PROMPT: &str = r#"
Generate Python code for python-pptx presentation. OUTPUT MUST BE PURE PYTHON CODE ONLY.

CRITICAL:
- NO comments (# comment)
- NO explanations
- NO markdown (```python or ```)
- NO text outside code
- NO example usage
- NO instructions

REQUIREMENTS:
- Use python-pptx
- Create multiple slides with different layouts
- Save as 'test.pptx'
- Code must run without errors

NOW GENERATE PURE PYTHON CODE:"#;

const DETAILED_PROMPT: &str = r#"
Generate Python code for python-pptx presentation. OUTPUT MUST BE PURE PYTHON CODE ONLY.

PYTHON-PPTX SPECIFICS:
- Use Presentation() to create presentation
- Use slide_layouts[] for slide types: 0=Title, 1=Title and Content, 5=Title only
- Use Inches() for measurements
- Add slides with prs.slides.add_slide(layout)
- Set text with shape.text = "text"
- Save with prs.save('test.pptx')

CODE STRUCTURE:
from pptx import Presentation
from pptx.util import Inches

prs = Presentation()
slide = prs.slides.add_slide(prs.slide_layouts[0])
slide.shapes.title.text = "Title"
prs.save('test.pptx')

OUTPUT MUST BE PURE PYTHON CODE ONLY. NO COMMENTS. NO EXPLANATIONS."#;

const MINIMAL_PROMPT: &str = r#"
Generate python-pptx code. Output ONLY Python code.

from pptx import Presentation
prs = Presentation()
slide = prs.slides.add_slide(prs.slide_layouts[0])
slide.shapes.title.text = "Title"
prs.save('test.pptx')

Continue with more slides:"#;

const STRUCTURED_PROMPT: &str = r#"
PYTHON CODE ONLY. NO COMMENTS. FOLLOW TEMPLATE:

from pptx import Presentation
from pptx.util import Inches

prs = Presentation()
slide = prs.slides.add_slide(prs.slide_layouts[0])
slide.shapes.title.text = "TITLE"
slide.placeholders[1].text = "SUBTITLE"

# ADD MORE SLIDES WITH DIFFERENT LAYOUTS

prs.save('test.pptx')"#;

/// A named built-in system prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum PromptVariant {
    /// Long instruction with a worked python-pptx example.
    Original,
    /// Strict pure-code instruction with a short valid example.
    Default,
    Basic,
    Detailed,
    Minimal,
    Structured,
}

impl PromptVariant {
    pub const ALL: [PromptVariant; 6] = [
        PromptVariant::Original,
        PromptVariant::Default,
        PromptVariant::Basic,
        PromptVariant::Detailed,
        PromptVariant::Minimal,
        PromptVariant::Structured,
    ];

    /// Variants compared by the prompt benchmark.
    pub const COMPARED: [PromptVariant; 4] = [
        PromptVariant::Basic,
        PromptVariant::Detailed,
        PromptVariant::Minimal,
        PromptVariant::Structured,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            PromptVariant::Original => "original",
            PromptVariant::Default => "default",
            PromptVariant::Basic => "basic",
            PromptVariant::Detailed => "detailed",
            PromptVariant::Minimal => "minimal",
            PromptVariant::Structured => "structured",
        }
    }

    pub fn text(&self) -> &'static str {
        match self {
            PromptVariant::Original => ORIGINAL_PROMPT,
            PromptVariant::Default => DEFAULT_PROMPT,
            PromptVariant::Basic => BASIC_PROMPT,
            PromptVariant::Detailed => DETAILED_PROMPT,
            PromptVariant::Minimal => MINIMAL_PROMPT,
            PromptVariant::Structured => STRUCTURED_PROMPT,
        }
    }
}

impl fmt::Display for PromptVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for PromptVariant {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .find(|v| v.name().eq_ignore_ascii_case(s.trim()))
            .copied()
            .ok_or_else(|| format!("Unknown prompt variant: {s}"))
    }
}

/// Maps classifier class ids onto prompt variants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutingTable {
    variants: Vec<PromptVariant>,
}

impl Default for RoutingTable {
    fn default() -> Self {
        Self::new(vec![
            PromptVariant::Original,
            PromptVariant::Basic,
            PromptVariant::Detailed,
            PromptVariant::Structured,
        ])
    }
}

impl RoutingTable {
    /// Class `i` routes to `variants[i]`.
    pub fn new(variants: Vec<PromptVariant>) -> Self {
        Self { variants }
    }

    pub fn variant_for(&self, class_id: usize) -> Option<PromptVariant> {
        self.variants.get(class_id).copied()
    }

    pub fn len(&self) -> usize {
        self.variants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variants.is_empty()
    }

    /// Class ids in order.
    pub fn classes(&self) -> std::ops::Range<usize> {
        0..self.variants.len()
    }
}
